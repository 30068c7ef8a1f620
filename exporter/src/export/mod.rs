//! Card export orchestration.
//!
//! For every card: download → reformat → back up the previous file → write.
//! Filenames follow `{prefix}_card{id}_{YYYYmmdd-HHMMSS}.csv` unless a fixed
//! name is given for a single card.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::client::MetabaseClient;
use crate::config::Settings;
use crate::error::{ConfigError, ConfigResult, ExportResult};
use crate::logs::{log_info, log_info_indent, log_success, log_success_indent};
use crate::transform::{reformat_with_report, ReformatOptions};

/// Timestamp format used in filenames and backup names
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Everything a run needs besides the environment settings.
#[derive(Debug, Clone, Default)]
pub struct ExportPlan {
    /// Cards to export, in order
    pub card_ids: Vec<u64>,
    /// Card parameters, sent as query string
    pub params: Vec<(String, String)>,
    /// Fixed output filename (single card only)
    pub filename: Option<String>,
    /// Append the run timestamp to generated filenames
    pub timestamp: bool,
    /// Extra attempts per card after the first
    pub retries: u32,
    /// Move an existing output file aside before writing
    pub backup: bool,
    /// Where backups go (default: next to the file)
    pub backup_dir: Option<PathBuf>,
    /// Ask Metabase for formatted values
    pub format_rows: bool,
    /// Output CSV dialect and numeric notation
    pub reformat: ReformatOptions,
}

impl ExportPlan {
    /// Reject combinations that cannot produce a sensible run.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.filename.is_some() && self.card_ids.len() > 1 {
            return Err(ConfigError::FilenameWithManyCards);
        }
        self.reformat.target_dialect()?;
        Ok(())
    }
}

/// Parse repeated `name=value` card parameters.
///
/// Splits at the first `=`; a repeated name keeps its first position and
/// takes the last value.
pub fn parse_params(raw: &[String]) -> ConfigResult<Vec<(String, String)>> {
    let mut params: Vec<(String, String)> = Vec::new();
    for p in raw {
        let (name, value) = p
            .split_once('=')
            .ok_or_else(|| ConfigError::InvalidParam(p.clone()))?;

        match params.iter_mut().find(|(k, _)| k == name) {
            Some(existing) => existing.1 = value.to_string(),
            None => params.push((name.to_string(), value.to_string())),
        }
    }
    Ok(params)
}

/// Replace every char that is not alphanumeric, `-`, `_` or `.` with `_`.
pub fn safe_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Format a run timestamp.
pub fn format_timestamp(at: DateTime<Local>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Output filename for one card of a run.
pub fn output_filename(plan: &ExportPlan, file_prefix: &str, card_id: u64, run_timestamp: &str) -> String {
    if let (Some(fixed), 1) = (&plan.filename, plan.card_ids.len()) {
        return safe_filename(fixed);
    }

    let mut base = format!("{}_card{}", file_prefix, card_id);
    if plan.timestamp {
        base.push('_');
        base.push_str(run_timestamp);
    }
    format!("{}.csv", safe_filename(&base))
}

/// Move `path` aside as `<stem>_backup_<timestamp><ext>` if it exists.
///
/// The backup goes to `backup_dir` (created if needed) or next to the file.
/// Returns the backup path, or `None` when there was nothing to back up.
pub fn backup_existing(path: &Path, backup_dir: Option<&Path>) -> io::Result<Option<PathBuf>> {
    backup_existing_at(path, backup_dir, &format_timestamp(Local::now()))
}

/// [`backup_existing`] with an explicit timestamp.
pub fn backup_existing_at(
    path: &Path,
    backup_dir: Option<&Path>,
    timestamp: &str,
) -> io::Result<Option<PathBuf>> {
    if !path.exists() {
        return Ok(None);
    }

    let target_dir = match backup_dir {
        Some(dir) => dir.to_path_buf(),
        None => path.parent().map(Path::to_path_buf).unwrap_or_default(),
    };
    if !target_dir.as_os_str().is_empty() {
        fs::create_dir_all(&target_dir)?;
    }

    let stem = path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let backup_path = target_dir.join(format!("{}_backup_{}{}", stem, timestamp, ext));

    move_file(path, &backup_path)?;
    log_info(format!("Backup created: {}", backup_path.display()));
    Ok(Some(backup_path))
}

/// Rename, falling back to copy + remove across filesystems.
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) => {
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
    }
}

/// Reformat a downloaded card and write it into the output directory.
pub fn write_export(
    settings: &Settings,
    plan: &ExportPlan,
    card_id: u64,
    run_timestamp: &str,
    raw: &[u8],
) -> ExportResult<PathBuf> {
    let (data, report) = reformat_with_report(raw, &plan.reformat);
    if report.passthrough {
        log_info_indent("Keeping Metabase CSV format", 1);
    } else {
        log_info_indent(
            format!(
                "Reformatted {} rows ({} numeric cells rewritten)",
                report.rows, report.cells_rewritten
            ),
            1,
        );
    }

    let fname = output_filename(plan, &settings.file_prefix, card_id, run_timestamp);
    let out_path = settings.output_dir.join(fname);

    if plan.backup {
        backup_existing(&out_path, plan.backup_dir.as_deref())?;
    }

    fs::write(&out_path, &data)?;
    log_success_indent(format!("Saved: {}", out_path.display()), 1);
    Ok(out_path)
}

/// Export every card of the plan, returning the written paths in order.
pub async fn export_cards(
    client: &MetabaseClient,
    settings: &Settings,
    plan: &ExportPlan,
) -> ExportResult<Vec<PathBuf>> {
    plan.validate()?;
    fs::create_dir_all(&settings.output_dir)?;

    let run_timestamp = format_timestamp(Local::now());
    let mut written = Vec::with_capacity(plan.card_ids.len());

    for (idx, &card_id) in plan.card_ids.iter().enumerate() {
        log_info(format!("Card {} ({}/{})", card_id, idx + 1, plan.card_ids.len()));

        let raw = client
            .fetch_with_retry(card_id, &plan.params, plan.format_rows, plan.retries)
            .await?;
        log_info_indent(format!("Downloaded {} bytes", raw.len()), 1);

        written.push(write_export(settings, plan, card_id, &run_timestamp, &raw)?);
    }

    log_success("Done.");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;
    use tempfile::TempDir;

    fn settings(dir: &Path) -> Settings {
        Settings {
            host: "https://mb".into(),
            output_dir: dir.to_path_buf(),
            file_prefix: "metabase_export".into(),
            credentials: Credentials::ApiKey("k".into()),
        }
    }

    fn plan(card_ids: &[u64]) -> ExportPlan {
        ExportPlan {
            card_ids: card_ids.to_vec(),
            timestamp: true,
            retries: 2,
            ..ExportPlan::default()
        }
    }

    #[test]
    fn test_safe_filename() {
        assert_eq!(safe_filename("vendas 2025/08.csv"), "vendas_2025_08.csv");
        assert_eq!(safe_filename("relatório-final_v1.csv"), "relatório-final_v1.csv");
        assert_eq!(safe_filename("a:b*c?"), "a_b_c_");
    }

    #[test]
    fn test_output_filename_with_timestamp() {
        let name = output_filename(&plan(&[12, 34]), "metabase_export", 34, "20250801-093000");
        assert_eq!(name, "metabase_export_card34_20250801-093000.csv");
    }

    #[test]
    fn test_output_filename_without_timestamp() {
        let mut p = plan(&[12]);
        p.timestamp = false;
        assert_eq!(output_filename(&p, "my prefix", 12, "ts"), "my_prefix_card12.csv");
    }

    #[test]
    fn test_fixed_filename_for_single_card() {
        let mut p = plan(&[12]);
        p.filename = Some("meu relatorio.csv".into());
        assert_eq!(output_filename(&p, "x", 12, "ts"), "meu_relatorio.csv");
    }

    #[test]
    fn test_fixed_filename_rejected_for_many_cards() {
        let mut p = plan(&[1, 2]);
        p.filename = Some("out.csv".into());
        assert!(matches!(p.validate(), Err(ConfigError::FilenameWithManyCards)));
    }

    #[test]
    fn test_validate_rejects_bad_delimiter() {
        let mut p = plan(&[1]);
        p.reformat.delimiter = '"';
        assert!(matches!(p.validate(), Err(ConfigError::InvalidDelimiter('"'))));
    }

    #[test]
    fn test_parse_params() {
        let raw = vec![
            "status=active".to_string(),
            "filter=a=b".to_string(),
            "status=closed".to_string(),
        ];
        let params = parse_params(&raw).unwrap();
        assert_eq!(
            params,
            vec![
                ("status".to_string(), "closed".to_string()),
                ("filter".to_string(), "a=b".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_params_rejects_missing_equals() {
        let err = parse_params(&["oops".to_string()]).unwrap_err();
        assert_eq!(err.to_string(), "Invalid --param 'oops'. Use name=value.");
    }

    #[test]
    fn test_backup_missing_file_is_noop() {
        let dir = TempDir::new().unwrap();
        let result = backup_existing(&dir.path().join("nope.csv"), None).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_backup_next_to_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.csv");
        fs::write(&path, "old").unwrap();

        let backup = backup_existing_at(&path, None, "20250101-000000").unwrap().unwrap();

        assert_eq!(backup, dir.path().join("report_backup_20250101-000000.csv"));
        assert!(!path.exists());
        assert_eq!(fs::read_to_string(&backup).unwrap(), "old");
    }

    #[test]
    fn test_backup_into_new_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.csv");
        fs::write(&path, "old").unwrap();
        let backups = dir.path().join("backups").join("nested");

        let backup = backup_existing_at(&path, Some(&backups), "ts").unwrap().unwrap();

        assert_eq!(backup, backups.join("report_backup_ts.csv"));
        assert!(backup.exists());
    }

    #[test]
    fn test_write_export_writes_transformed_bytes() {
        let dir = TempDir::new().unwrap();
        let mut p = plan(&[7]);
        p.reformat = ReformatOptions {
            quote_all: false,
            numeric_rewrite: true,
            delimiter: ';',
            add_bom: true,
        };

        let path = write_export(&settings(dir.path()), &p, 7, "20250801-093000", b"a,b\n1.5,x\n").unwrap();

        assert_eq!(path, dir.path().join("metabase_export_card7_20250801-093000.csv"));
        assert_eq!(fs::read(&path).unwrap(), b"\xEF\xBB\xBFa;b\n1,50;x\n");
    }

    #[test]
    fn test_write_export_with_backup() {
        let dir = TempDir::new().unwrap();
        let mut p = plan(&[7]);
        p.timestamp = false;
        p.backup = true;
        p.backup_dir = Some(dir.path().join("old"));
        let s = settings(dir.path());

        let first = write_export(&s, &p, 7, "ts", b"v\n1\n").unwrap();
        let second = write_export(&s, &p, 7, "ts", b"v\n2\n").unwrap();

        assert_eq!(first, second);
        assert_eq!(fs::read(&second).unwrap(), b"v\n2\n");
        let backups: Vec<_> = fs::read_dir(dir.path().join("old")).unwrap().collect();
        assert_eq!(backups.len(), 1);
    }
}
