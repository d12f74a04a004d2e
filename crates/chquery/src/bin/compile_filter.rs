use std::fs;
use std::path::Path;

use chquery::logs::LogConditionBuilder;
use chquery::{where_clause, CompileOptions};
use telemetry::{FieldContext, FieldDataType, Registry, Signal, TelemetryFieldKey};

/// Strip comments starting with # from the query
fn strip_comments(content: &str) -> String {
    content
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Registry covering every key the fixture queries reference.
fn demo_registry() -> Registry {
    let mut registry = Registry::new();
    let keys = [
        ("service.name", FieldContext::Resource, FieldDataType::String),
        ("http.status_code", FieldContext::Attribute, FieldDataType::Number),
        ("http.route", FieldContext::Attribute, FieldDataType::String),
        ("http.url", FieldContext::Attribute, FieldDataType::String),
        ("user.email", FieldContext::Attribute, FieldDataType::String),
        ("status", FieldContext::Attribute, FieldDataType::String),
        ("region", FieldContext::Attribute, FieldDataType::String),
        ("has_error", FieldContext::Attribute, FieldDataType::Bool),
        ("duration_nano", FieldContext::Attribute, FieldDataType::Number),
        ("events", FieldContext::Attribute, FieldDataType::String),
        ("tags", FieldContext::Attribute, FieldDataType::String),
        ("body", FieldContext::Log, FieldDataType::String),
        ("severity_text", FieldContext::Log, FieldDataType::String),
    ];
    for (name, context, data_type) in keys {
        registry.insert(
            name.to_string(),
            vec![TelemetryFieldKey::new(name, Signal::Logs, context, data_type)],
        );
    }
    registry
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let queries_dir = Path::new("crates/filterql/queries");
    let registry = demo_registry();
    let builder = LogConditionBuilder::new();
    let opts = CompileOptions::default();

    // Read all .fq files
    let entries = fs::read_dir(queries_dir).unwrap();

    for entry in entries {
        let entry = entry.unwrap();
        let path = entry.path();

        if path.extension().and_then(|s| s.to_str()) == Some("fq") {
            let fq_content = fs::read_to_string(&path).unwrap();
            let query = strip_comments(&fq_content);

            if query.is_empty() {
                continue;
            }

            // Compile to a WHERE clause
            match where_clause(&query, &registry, &builder, &opts) {
                Ok(fragment) => {
                    // Write to corresponding .sql file, args as a trailer
                    let sql_path = path.with_extension("sql");
                    let args = serde_json::to_string(&fragment.args).unwrap();
                    fs::write(&sql_path, format!("{}\n-- args: {}\n", fragment.sql, args))
                        .unwrap();
                    println!("Generated: {}", sql_path.display());
                    for warning in &fragment.warnings {
                        eprintln!("Warning for {}: {}", path.display(), warning);
                    }
                }
                Err(e) => {
                    eprintln!("Error compiling {}: {}", path.display(), e);
                }
            }
        }
    }
}
