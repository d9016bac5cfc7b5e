use crate::config::RestoreConfig;
use crate::error::{BackupError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;

/// One `updateMany` applied to the restored database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateSpec {
    pub collection: String,
    pub filter: Value,
    pub update: Value,
}

pub fn parse_updates(raw: &str) -> Result<Vec<UpdateSpec>> {
    serde_json::from_str(raw).map_err(|e| BackupError::Config(format!("invalid updates: {}", e)))
}

/// Inline `updates` win over `updates_file`; neither yields an empty list.
pub fn load_updates(config: &RestoreConfig) -> Result<Vec<UpdateSpec>> {
    if let Some(raw) = config.updates.as_deref().filter(|u| !u.trim().is_empty()) {
        return parse_updates(raw);
    }
    if let Some(path) = &config.updates_file {
        let raw = fs::read_to_string(path).map_err(|e| {
            BackupError::Config(format!("failed to read updates file {}: {}", path.display(), e))
        })?;
        return parse_updates(&raw);
    }
    Ok(Vec::new())
}

/// Shell script running every update and printing matched/modified counts.
pub fn update_script(updates: &[UpdateSpec], db: Option<&str>) -> Result<String> {
    let encoded = serde_json::to_string(updates)
        .map_err(|e| BackupError::Serialization(format!("failed to encode updates: {}", e)))?;
    let target = match db.filter(|d| !d.is_empty()) {
        Some(name) => format!(
            "db.getSiblingDB({})",
            serde_json::to_string(name).map_err(|e| BackupError::Serialization(e.to_string()))?
        ),
        None => "db".to_string(),
    };

    Ok(format!(
        "const target = {target};\n\
         EJSON.deserialize({encoded}).forEach((u, i) => {{\n\
         \x20 const r = target.getCollection(u.collection).updateMany(u.filter, u.update);\n\
         \x20 print(`Update[${{i}}]: matched count: ${{r.matchedCount}}`);\n\
         \x20 print(`Update[${{i}}]: modified count: ${{r.modifiedCount}}`);\n\
         }});"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    const RAW: &str = r#"[{"collection": "users", "filter": {"active": false}, "update": {"$set": {"archived": true}}}]"#;

    #[test]
    fn test_parse_updates() {
        let updates = parse_updates(RAW).unwrap();
        assert_eq!(
            updates,
            vec![UpdateSpec {
                collection: "users".to_string(),
                filter: json!({"active": false}),
                update: json!({"$set": {"archived": true}}),
            }]
        );
    }

    #[test]
    fn test_malformed_updates_are_config_errors() {
        assert!(matches!(parse_updates("{not json"), Err(BackupError::Config(_))));
        assert!(matches!(
            parse_updates(r#"[{"collection": "users", "filter": {}}]"#),
            Err(BackupError::Config(_))
        ));
    }

    #[test]
    fn test_inline_updates_win_over_file() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("updates.json");
        std::fs::write(&file, r#"[{"collection": "orders", "filter": {}, "update": {"$unset": {"tmp": ""}}}]"#)
            .unwrap();

        let mut config = RestoreConfig {
            updates_file: Some(file),
            ..Default::default()
        };
        assert_eq!(load_updates(&config).unwrap()[0].collection, "orders");

        config.updates = Some(RAW.to_string());
        assert_eq!(load_updates(&config).unwrap()[0].collection, "users");

        assert!(load_updates(&RestoreConfig::default()).unwrap().is_empty());
    }

    #[test]
    fn test_missing_updates_file() {
        let config = RestoreConfig {
            updates_file: Some("/nonexistent/updates.json".into()),
            ..Default::default()
        };
        assert!(matches!(load_updates(&config), Err(BackupError::Config(_))));
    }

    #[test]
    fn test_script_targets_database() {
        let script = update_script(&parse_updates(RAW).unwrap(), Some("app")).unwrap();
        assert!(script.starts_with("const target = db.getSiblingDB(\"app\");"));
        assert!(script.contains(r#""collection":"users""#));
        assert!(script.contains("updateMany(u.filter, u.update)"));
        assert!(script.contains("Update[${i}]: modified count: ${r.modifiedCount}"));

        let script = update_script(&[], None).unwrap();
        assert!(script.starts_with("const target = db;"));
    }
}
