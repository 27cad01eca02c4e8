//! Subcommand handlers.

use crate::{Commands, ConfigAction};
use anyhow::{Context, bail};
use sparkmap_core::config::{self, ReportFormat, SparkmapConfig};
use sparkmap_core::{Extractor, output_file_name, render};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub fn handle_command(
    command: Commands,
    workspace: &Path,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    match command {
        Commands::Extract {
            paths,
            format,
            output_dir,
            stdout,
        } => {
            let mut config = config::load_config(Some(workspace), config_path)
                .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
            if let Some(format) = format {
                config.report.format = format
                    .parse::<ReportFormat>()
                    .map_err(|e| anyhow::anyhow!("{}", e))?;
            }
            if let Some(dir) = output_dir {
                config.report.output_dir = dir;
            }
            handle_extract(&paths, &config, stdout)
        }
        Commands::Config { action } => handle_config(action, workspace, config_path),
    }
}

fn handle_config(
    action: ConfigAction,
    workspace: &Path,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let path = config::workspace_config_path(workspace);
            if path.exists() {
                println!("Configuration file already exists at: {}", path.display());
                return Ok(());
            }
            let path = config::write_default_config(workspace)?;
            println!("Created default configuration at: {}", path.display());
            Ok(())
        }
        ConfigAction::Show => {
            let config = config::load_config(Some(workspace), config_path)
                .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{}", toml_str);
            Ok(())
        }
    }
}

/// Python sources under the given paths: files as given, directories walked
/// recursively for `*.py` in sorted order.
fn collect_sources(paths: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut sources = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path).sort_by_file_name() {
                let entry =
                    entry.with_context(|| format!("failed to walk {}", path.display()))?;
                let is_python = entry.path().extension().is_some_and(|ext| ext == "py");
                if entry.file_type().is_file() && is_python {
                    sources.push(entry.into_path());
                }
            }
        } else if path.is_file() {
            sources.push(path.clone());
        } else {
            bail!("no such file or directory: {}", path.display());
        }
    }
    Ok(sources)
}

fn handle_extract(paths: &[PathBuf], config: &SparkmapConfig, stdout: bool) -> anyhow::Result<()> {
    let sources = collect_sources(paths)?;
    if sources.is_empty() {
        bail!("no Python files found");
    }

    let extractor = Extractor::new(config.extractor.clone());
    let mut failed = 0usize;

    for source in &sources {
        match extract_one(&extractor, source, config, stdout) {
            Ok(Some(written)) => println!("{} -> {}", source.display(), written.display()),
            Ok(None) => {}
            Err(e) => {
                failed += 1;
                tracing::error!(path = %source.display(), "extraction failed: {e:#}");
                eprintln!("Error: {}: {:#}", source.display(), e);
            }
        }
    }

    if failed > 0 {
        bail!("{failed} of {} file(s) failed", sources.len());
    }
    Ok(())
}

/// Extract one file and emit its report. Returns the path written, if any.
fn extract_one(
    extractor: &Extractor,
    source: &Path,
    config: &SparkmapConfig,
    stdout: bool,
) -> anyhow::Result<Option<PathBuf>> {
    let text = std::fs::read_to_string(source)
        .with_context(|| format!("failed to read {}", source.display()))?;
    let extraction = extractor.extract(&text)?;
    tracing::info!(
        path = %source.display(),
        mappings = extraction.mappings.len(),
        joins = extraction.joins.len(),
        "extracted"
    );

    let report = render(&extraction, config.report.format)?;
    if stdout {
        println!("{report}");
        return Ok(None);
    }

    let dir = &config.report.output_dir;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;
    let name = output_file_name(
        &config.report.file_prefix,
        &extraction.target_table,
        &chrono::Local::now(),
        config.report.format.extension(),
    );
    let path = dir.join(name);
    std::fs::write(&path, report).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const JOB: &str = "target_table = 'gold.members'\n\
                       m = spark.table('edw.member')\n\
                       out = m.select(col('id').alias('member_id'))\n";

    #[test]
    fn test_collect_sources_walks_directories() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("jobs/nested")).unwrap();
        std::fs::write(dir.path().join("jobs/b.py"), "").unwrap();
        std::fs::write(dir.path().join("jobs/nested/a.py"), "").unwrap();
        std::fs::write(dir.path().join("jobs/readme.md"), "").unwrap();

        let sources = collect_sources(&[dir.path().join("jobs")]).unwrap();
        let names: Vec<_> = sources
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["b.py", "a.py"]);

        assert!(collect_sources(&[dir.path().join("missing.py")]).is_err());
    }

    #[test]
    fn test_extract_writes_report() {
        let dir = TempDir::new().unwrap();
        let job = dir.path().join("job.py");
        std::fs::write(&job, JOB).unwrap();

        let mut config = SparkmapConfig::default();
        config.report.output_dir = dir.path().join("out");
        config.report.format = ReportFormat::Json;

        handle_extract(&[job], &config, false).unwrap();

        let written: Vec<_> = std::fs::read_dir(dir.path().join("out"))
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(written.len(), 1);
        let name = written[0].file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("mapping_output_gold_members_"));
        assert!(name.ends_with(".json"));
    }

    #[test]
    fn test_failed_file_does_not_stop_others() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("good.py");
        let bad = dir.path().join("bad.py");
        std::fs::write(&good, JOB).unwrap();
        std::fs::write(&bad, "df = spark.table(\n").unwrap();

        let mut config = SparkmapConfig::default();
        config.report.output_dir = dir.path().join("out");

        let err = handle_extract(&[bad, good], &config, false).unwrap_err();
        assert!(err.to_string().contains("1 of 2"));
        assert_eq!(std::fs::read_dir(dir.path().join("out")).unwrap().count(), 1);
    }

    #[test]
    fn test_config_init_is_idempotent() {
        let dir = TempDir::new().unwrap();
        handle_config(ConfigAction::Init, dir.path(), None).unwrap();
        let path = config::workspace_config_path(dir.path());
        std::fs::write(&path, "[report]\nformat = \"json\"\n").unwrap();

        handle_config(ConfigAction::Init, dir.path(), None).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("json"));
    }
}
