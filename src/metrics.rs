//! Classification metrics against labelled datasets

/// Binary confusion matrix
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConfusionMatrix {
    pub true_positives: usize,
    pub false_positives: usize,
    pub true_negatives: usize,
    pub false_negatives: usize,
}

impl ConfusionMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tally paired (predicted, actual) labels
    pub fn from_labels<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (bool, bool)>,
    {
        let mut matrix = Self::new();
        for (predicted, actual) in pairs {
            matrix.record(predicted, actual);
        }
        matrix
    }

    pub fn record(&mut self, predicted: bool, actual: bool) {
        match (predicted, actual) {
            (true, true) => self.true_positives += 1,
            (true, false) => self.false_positives += 1,
            (false, false) => self.true_negatives += 1,
            (false, true) => self.false_negatives += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.true_positives + self.false_positives + self.true_negatives + self.false_negatives
    }

    pub fn accuracy(&self) -> Option<f64> {
        ratio(self.true_positives + self.true_negatives, self.total())
    }

    pub fn precision(&self) -> Option<f64> {
        ratio(
            self.true_positives,
            self.true_positives + self.false_positives,
        )
    }

    pub fn recall(&self) -> Option<f64> {
        ratio(
            self.true_positives,
            self.true_positives + self.false_negatives,
        )
    }

    /// Precision expected on data whose positive:negative ratio is `real_ratio`
    ///
    /// True positives are rescaled by `real_ratio / v`, where `v` is the
    /// positive:negative ratio of the evaluated dataset.
    pub fn adjusted_precision(&self, real_ratio: f64) -> Option<f64> {
        if !(real_ratio.is_finite() && real_ratio > 0.0) {
            return None;
        }
        let dataset_ratio = ratio(
            self.true_positives + self.false_negatives,
            self.true_negatives + self.false_positives,
        )?;
        if dataset_ratio == 0.0 {
            return None;
        }

        let scaled_tp = real_ratio / dataset_ratio * self.true_positives as f64;
        let denominator = scaled_tp + self.false_positives as f64;
        (denominator > 0.0).then(|| scaled_tp / denominator)
    }
}

fn ratio(numerator: usize, denominator: usize) -> Option<f64> {
    (denominator > 0).then(|| numerator as f64 / denominator as f64)
}

fn format_ratio(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.4}", v))
}

impl std::fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "TP: {}, FP: {}, TN: {}, FN: {}, accuracy: {}, precision: {}, recall: {}",
            self.true_positives,
            self.false_positives,
            self.true_negatives,
            self.false_negatives,
            format_ratio(self.accuracy()),
            format_ratio(self.precision()),
            format_ratio(self.recall())
        )
    }
}
