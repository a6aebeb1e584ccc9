//! Helpers shared by the `docshield` command-line tool.

use std::path::Path;

use anyhow::{bail, Context};
use docshield_core::models::{RedactionArea, RedactionStyle};
use docshield_infra::{init_telemetry, LogFormat};
use docshield_services::RuleSelection;
use serde::Serialize;

/// Initialize tracing for the CLI. Output format follows `LOG_FORMAT`.
pub fn init_tracing() -> anyhow::Result<()> {
    init_telemetry(LogFormat::from_env())
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))
}

pub fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

pub async fn read_document(path: &Path) -> anyhow::Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

pub async fn write_document(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// Parse redaction areas from a JSON array, or from a file when the
/// argument starts with `@`.
pub async fn load_areas(arg: &str) -> anyhow::Result<Vec<RedactionArea>> {
    let json = match arg.strip_prefix('@') {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read areas from {}", path))?,
        None => arg.to_string(),
    };
    parse_areas(&json)
}

pub fn parse_areas(json: &str) -> anyhow::Result<Vec<RedactionArea>> {
    let areas: Vec<RedactionArea> =
        serde_json::from_str(json).context("Areas must be a JSON array of {page, x, y, width, height}")?;
    if areas.is_empty() {
        bail!("At least one redaction area is required");
    }
    Ok(areas)
}

/// `#RRGGBB` or `RRGGBB`.
pub fn parse_fill_color(value: &str) -> anyhow::Result<[u8; 3]> {
    let hex = value.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        bail!("Fill color must be six hex digits, e.g. #000000");
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&hex[range], 16)
            .with_context(|| format!("Invalid fill color '{}'", value))
    };
    Ok([channel(0..2)?, channel(2..4)?, channel(4..6)?])
}

pub fn style_from_args(fill: Option<&str>, label: Option<String>) -> anyhow::Result<RedactionStyle> {
    let mut style = RedactionStyle::default();
    if let Some(fill) = fill {
        style.fill_color = parse_fill_color(fill)?;
    }
    style.label = label;
    Ok(style)
}

/// Build a rule selection from `--rules` / `--template`.
///
/// Rules written as `template:rule` select a rule through a template; plain
/// ids name catalog rules. Mixing both forms is rejected.
pub fn rule_selection(rules: &[String], template: Option<String>) -> anyhow::Result<RuleSelection> {
    match (template, rules.is_empty()) {
        (Some(_), false) => bail!("--template and --rules cannot be combined"),
        (Some(template), true) => Ok(RuleSelection::Template(template)),
        (None, true) => Ok(RuleSelection::All),
        (None, false) => {
            let qualified: Vec<(String, String)> = rules
                .iter()
                .filter_map(|r| r.split_once(':'))
                .map(|(t, r)| (t.to_string(), r.to_string()))
                .collect();
            if qualified.is_empty() {
                Ok(RuleSelection::Rules(rules.to_vec()))
            } else if qualified.len() == rules.len() {
                Ok(RuleSelection::Qualified(qualified))
            } else {
                bail!("Rules must be either all plain ids or all template:rule pairs")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_areas() {
        let areas =
            parse_areas(r#"[{"page": 1, "x": 0.1, "y": 0.2, "width": 0.3, "height": 0.4}]"#)
                .unwrap();
        assert_eq!(areas, vec![RedactionArea::new(1, 0.1, 0.2, 0.3, 0.4)]);
    }

    #[test]
    fn test_parse_areas_rejects_empty_and_garbage() {
        assert!(parse_areas("[]").is_err());
        assert!(parse_areas("{\"page\": 0}").is_err());
        assert!(parse_areas("not json").is_err());
    }

    #[tokio::test]
    async fn test_load_areas_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("areas.json");
        std::fs::write(&path, r#"[{"page": 0, "x": 0, "y": 0, "width": 1, "height": 0.5}]"#)
            .unwrap();

        let areas = load_areas(&format!("@{}", path.display())).await.unwrap();
        assert_eq!(areas.len(), 1);
        assert_eq!(areas[0].height, 0.5);

        assert!(load_areas("@/nonexistent/areas.json").await.is_err());
    }

    #[test]
    fn test_parse_fill_color() {
        assert_eq!(parse_fill_color("#ff8000").unwrap(), [255, 128, 0]);
        assert_eq!(parse_fill_color("000000").unwrap(), [0, 0, 0]);
        assert!(parse_fill_color("#fff").is_err());
        assert!(parse_fill_color("#gg0000").is_err());
    }

    #[test]
    fn test_style_defaults_to_black() {
        let style = style_from_args(None, None).unwrap();
        assert_eq!(style, RedactionStyle::default());
        let labelled = style_from_args(Some("#ffffff"), Some("REDACTED".into())).unwrap();
        assert_eq!(labelled.fill_color, [255, 255, 255]);
        assert_eq!(labelled.label.as_deref(), Some("REDACTED"));
    }

    #[test]
    fn test_rule_selection() {
        assert_eq!(rule_selection(&[], None).unwrap(), RuleSelection::All);
        assert_eq!(
            rule_selection(&[], Some("pii".into())).unwrap(),
            RuleSelection::Template("pii".into())
        );
        assert_eq!(
            rule_selection(&["email".into(), "ssn".into()], None).unwrap(),
            RuleSelection::Rules(vec!["email".into(), "ssn".into()])
        );
        assert_eq!(
            rule_selection(&["medical:medical_record_number".into()], None).unwrap(),
            RuleSelection::Qualified(vec![("medical".into(), "medical_record_number".into())])
        );
        assert!(rule_selection(&["email".into()], Some("pii".into())).is_err());
        assert!(rule_selection(&["email".into(), "medical:medical_record_number".into()], None).is_err());
    }
}
