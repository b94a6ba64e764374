//! Classifier adapters
//!
//! Splice-site and intron classifiers are consumed as opaque oracles: a batch
//! of fixed-width records goes in, one boolean label per record comes out.
//! Which implementation serves a role is decided by configuration.

use crate::tables::{
    read_rows_concat, IntronRow, SitePositionRow, DELIMITER, INTRON_DATASET_HEADER,
};
use crate::types::{IntronCutError, Result, SiteKind};
use log::{debug, info};
use std::collections::HashSet;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// What a classifier is asked to recognise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OracleRole {
    Donor,
    Acceptor,
    Intron,
}

impl std::fmt::Display for OracleRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OracleRole::Donor => write!(f, "donor"),
            OracleRole::Acceptor => write!(f, "acceptor"),
            OracleRole::Intron => write!(f, "intron"),
        }
    }
}

impl std::str::FromStr for OracleRole {
    type Err = IntronCutError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "donor" => Ok(OracleRole::Donor),
            "acceptor" => Ok(OracleRole::Acceptor),
            "intron" => Ok(OracleRole::Intron),
            _ => Err(IntronCutError::InvalidConfig(format!(
                "Unknown classifier role: {}",
                s
            ))),
        }
    }
}

impl From<SiteKind> for OracleRole {
    fn from(kind: SiteKind) -> Self {
        match kind {
            SiteKind::Donor => OracleRole::Donor,
            SiteKind::Acceptor => OracleRole::Acceptor,
        }
    }
}

/// One classifier input; for sites `start` is the motif position and `end` its end
#[derive(Debug, Clone, Copy)]
pub struct OracleRecord<'a> {
    pub scaffold_id: &'a str,
    pub start: usize,
    pub end: usize,
    pub sequence: &'a [u8],
}

pub trait Oracle: Send + Sync {
    fn name(&self) -> String;

    /// One label per record, in record order
    fn classify(&self, role: OracleRole, records: &[OracleRecord<'_>]) -> Result<Vec<bool>>;
}

/// Labels every record positive
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThroughOracle;

impl Oracle for PassThroughOracle {
    fn name(&self) -> String {
        "pass-through".to_string()
    }

    fn classify(&self, _role: OracleRole, records: &[OracleRecord<'_>]) -> Result<Vec<bool>> {
        Ok(vec![true; records.len()])
    }
}

#[derive(Debug)]
enum PositiveKeys {
    Sites(HashSet<(String, usize)>),
    Introns(HashSet<(String, usize, usize)>),
}

/// Positives precomputed by an earlier classification run, possibly split into shards
#[derive(Debug)]
pub struct TableOracle {
    keys: PositiveKeys,
    sources: usize,
}

impl TableOracle {
    /// Load `scaffold;position` result tables
    pub fn from_site_results(paths: &[PathBuf]) -> Result<Self> {
        let table = read_rows_concat::<SitePositionRow, _>(paths)?;
        let keys: HashSet<(String, usize)> = table
            .rows
            .into_iter()
            .map(|row| (row.scaffold, row.position))
            .collect();
        info!(
            "Loaded {} positive sites from {} result tables",
            keys.len(),
            paths.len()
        );

        Ok(Self {
            keys: PositiveKeys::Sites(keys),
            sources: paths.len(),
        })
    }

    /// Load `scaffold;start;end` result tables
    pub fn from_intron_results(paths: &[PathBuf]) -> Result<Self> {
        let table = read_rows_concat::<IntronRow, _>(paths)?;
        let keys: HashSet<(String, usize, usize)> = table
            .rows
            .into_iter()
            .map(|row| (row.scaffold, row.start, row.end))
            .collect();
        info!(
            "Loaded {} positive introns from {} result tables",
            keys.len(),
            paths.len()
        );

        Ok(Self {
            keys: PositiveKeys::Introns(keys),
            sources: paths.len(),
        })
    }
}

impl Oracle for TableOracle {
    fn name(&self) -> String {
        format!("result tables ({})", self.sources)
    }

    fn classify(&self, role: OracleRole, records: &[OracleRecord<'_>]) -> Result<Vec<bool>> {
        match (&self.keys, role) {
            (PositiveKeys::Sites(keys), OracleRole::Donor | OracleRole::Acceptor) => Ok(records
                .iter()
                .map(|r| keys.contains(&(r.scaffold_id.to_string(), r.start)))
                .collect()),
            (PositiveKeys::Introns(keys), OracleRole::Intron) => Ok(records
                .iter()
                .map(|r| keys.contains(&(r.scaffold_id.to_string(), r.start, r.end)))
                .collect()),
            _ => Err(IntronCutError::InvalidConfig(format!(
                "Result tables loaded for another role cannot classify {} records",
                role
            ))),
        }
    }
}

/// External classifier program
///
/// Invoked as `<program> [args..] <model> <role>`. The records are written to
/// its stdin as a `scaffold;start;end;sequence` table and it answers on stdout
/// with a `;` table, header first, whose last column is the label.
#[derive(Debug, Clone)]
pub struct CommandOracle {
    program: PathBuf,
    args: Vec<String>,
    model: String,
}

impl CommandOracle {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>, model: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args,
            model: model.into(),
        }
    }

    fn unavailable(&self, detail: impl std::fmt::Display) -> IntronCutError {
        IntronCutError::OracleUnavailable(format!("{}: {}", self.program.display(), detail))
    }
}

fn write_records<W: Write>(writer: W, records: &[OracleRecord<'_>]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(false)
        .from_writer(writer);
    writer.write_record(INTRON_DATASET_HEADER)?;

    for record in records {
        let start = record.start.to_string();
        let end = record.end.to_string();
        writer.write_record([
            record.scaffold_id.as_bytes(),
            start.as_bytes(),
            end.as_bytes(),
            record.sequence,
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Parse the label column of a classifier answer
fn parse_labels(output: &[u8]) -> std::result::Result<Vec<bool>, String> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(true)
        .flexible(true)
        .from_reader(output);

    let mut labels = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|e| e.to_string())?;
        let label = record.iter().last().map(str::trim).unwrap_or_default();
        match label {
            "1" => labels.push(true),
            "0" | "-1" => labels.push(false),
            other => return Err(format!("unparseable label '{}' on row {}", other, index + 1)),
        }
    }

    Ok(labels)
}

impl Oracle for CommandOracle {
    fn name(&self) -> String {
        format!("{} ({})", self.program.display(), self.model)
    }

    fn classify(&self, role: OracleRole, records: &[OracleRecord<'_>]) -> Result<Vec<bool>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            "Invoking {} for {} {} records",
            self.program.display(),
            records.len(),
            role
        );

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(&self.model)
            .arg(role.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.unavailable(format!("failed to start: {}", e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| self.unavailable("stdin not captured"))?;

        // feed stdin while the child's output is drained, or a full pipe stalls both sides
        let (output, fed) = std::thread::scope(|scope| {
            let feeder = scope.spawn(move || write_records(stdin, records));
            let output = child.wait_with_output();
            (output, feeder.join())
        });

        let output = output.map_err(|e| self.unavailable(e))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.unavailable(format!(
                "exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        match fed {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(self.unavailable(format!("failed to send records: {}", e))),
            Err(_) => return Err(self.unavailable("record writer panicked")),
        }

        let labels = parse_labels(&output.stdout).map_err(|e| self.unavailable(e))?;
        if labels.len() != records.len() {
            return Err(self.unavailable(format!(
                "returned {} labels for {} records",
                labels.len(),
                records.len()
            )));
        }

        Ok(labels)
    }
}

/// How one oracle role is served
#[derive(Debug, Clone, Default)]
pub struct OracleSpec {
    /// Model reference; empty, `none` or `random` selects the pass-through oracle
    pub model: Option<String>,
    pub program: Option<PathBuf>,
    pub program_args: Vec<String>,
    /// Precomputed result tables; take precedence over the model
    pub results: Vec<PathBuf>,
}

impl OracleSpec {
    pub fn is_pass_through(&self) -> bool {
        self.results.is_empty()
            && self.model.as_deref().map_or(true, |model| {
                let model = model.trim();
                model.is_empty()
                    || model.eq_ignore_ascii_case("none")
                    || model.eq_ignore_ascii_case("random")
            })
    }
}

/// Build the oracle serving `role`
pub fn resolve_oracle(role: OracleRole, spec: &OracleSpec) -> Result<Box<dyn Oracle>> {
    let oracle: Box<dyn Oracle> = if !spec.results.is_empty() {
        match role {
            OracleRole::Intron => Box::new(TableOracle::from_intron_results(&spec.results)?),
            _ => Box::new(TableOracle::from_site_results(&spec.results)?),
        }
    } else if spec.is_pass_through() {
        Box::new(PassThroughOracle)
    } else {
        let program = spec.program.as_ref().ok_or_else(|| {
            IntronCutError::InvalidConfig(format!(
                "A {} model was given without a classifier program",
                role
            ))
        })?;
        let model = spec.model.clone().unwrap_or_default();
        Box::new(CommandOracle::new(
            program.clone(),
            spec.program_args.clone(),
            model,
        ))
    };

    info!("{} classifier: {}", role, oracle.name());
    Ok(oracle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::{tempdir, NamedTempFile};

    fn record<'a>(scaffold_id: &'a str, start: usize, end: usize, sequence: &'a [u8]) -> OracleRecord<'a> {
        OracleRecord {
            scaffold_id,
            start,
            end,
            sequence,
        }
    }

    #[test]
    fn test_pass_through_labels_everything_positive() {
        let records = [record("chr1", 10, 12, b"AAGTAA"), record("chr1", 30, 32, b"CCGTCC")];
        let labels = PassThroughOracle.classify(OracleRole::Donor, &records).unwrap();
        assert_eq!(labels, vec![true, true]);
    }

    #[test]
    fn test_table_oracle_site_lookup() {
        let mut results = NamedTempFile::new().unwrap();
        writeln!(results, "scaffold;position\nchr1;10\nchr2;30").unwrap();
        let oracle = TableOracle::from_site_results(&[results.path().to_path_buf()]).unwrap();

        let records = [
            record("chr1", 10, 12, b"AAGTAA"),
            record("chr1", 30, 32, b"CCGTCC"),
            record("chr2", 30, 32, b"CCGTCC"),
        ];
        let labels = oracle.classify(OracleRole::Acceptor, &records).unwrap();
        assert_eq!(labels, vec![true, false, true]);
        assert!(oracle.classify(OracleRole::Intron, &records).is_err());
    }

    #[test]
    fn test_table_oracle_intron_lookup() {
        let mut results = NamedTempFile::new().unwrap();
        writeln!(results, "scaffold;start;end\nchr1;40;122").unwrap();
        let oracle = TableOracle::from_intron_results(&[results.path().to_path_buf()]).unwrap();

        let records = [record("chr1", 40, 122, b"GT"), record("chr1", 40, 130, b"GT")];
        let labels = oracle.classify(OracleRole::Intron, &records).unwrap();
        assert_eq!(labels, vec![true, false]);
    }

    #[test]
    fn test_parse_labels() {
        assert_eq!(
            parse_labels(b"scaffold;start;end;label\nchr1;1;3;1\nchr1;5;7;-1\nchr1;8;9;0\n").unwrap(),
            vec![true, false, false]
        );
        assert!(parse_labels(b"label\nmaybe\n").is_err());
        assert!(parse_labels(b"label\n").unwrap().is_empty());
    }

    #[test]
    fn test_resolution_by_configuration() {
        let spec = OracleSpec {
            model: Some("random".to_string()),
            ..Default::default()
        };
        assert!(spec.is_pass_through());
        assert_eq!(
            resolve_oracle(OracleRole::Donor, &spec).unwrap().name(),
            "pass-through"
        );

        let spec = OracleSpec {
            model: Some("donor.model".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            resolve_oracle(OracleRole::Donor, &spec),
            Err(IntronCutError::InvalidConfig(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_oracle_round_trip() {
        let dir = tempdir().unwrap();
        let script = dir.path().join("classifier.sh");
        std::fs::write(
            &script,
            "read header\necho 'scaffold;start;end;label'\nwhile IFS=';' read s a b seq; do\n  case \"$seq\" in\n    *GT*) echo \"$s;$a;$b;1\" ;;\n    *) echo \"$s;$a;$b;-1\" ;;\n  esac\ndone\n",
        )
        .unwrap();

        let oracle = CommandOracle::new(
            "sh",
            vec![script.display().to_string()],
            "donor.model",
        );
        let records = [
            record("chr1", 10, 12, b"AAGTAA"),
            record("chr1", 30, 32, b"CCCCCC"),
        ];
        let labels = oracle.classify(OracleRole::Donor, &records).unwrap();
        assert_eq!(labels, vec![true, false]);

        assert!(oracle.classify(OracleRole::Donor, &[]).unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_command_oracle_failures_are_unavailable() {
        let failing = CommandOracle::new("sh", vec!["-c".to_string(), "exit 3".to_string()], "m");
        let records = [record("chr1", 10, 12, b"AAGTAA")];
        assert!(matches!(
            failing.classify(OracleRole::Donor, &records),
            Err(IntronCutError::OracleUnavailable(_))
        ));

        let short = CommandOracle::new(
            "sh",
            vec!["-c".to_string(), "cat > /dev/null; echo label".to_string()],
            "m",
        );
        assert!(matches!(
            short.classify(OracleRole::Donor, &records),
            Err(IntronCutError::OracleUnavailable(_))
        ));

        let missing = CommandOracle::new("/nonexistent/classifier", Vec::new(), "m");
        assert!(matches!(
            missing.classify(OracleRole::Donor, &records),
            Err(IntronCutError::OracleUnavailable(_))
        ));
    }
}
