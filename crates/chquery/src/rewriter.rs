//! Aggregation expression rewriter
//!
//! Aggregation expressions arrive as SQL-ish text (`countIf(service.name =
//! 'redis')`, `p95(duration_nano)`, `rate()`). The rewriter parses them
//! behind a synthetic `SELECT`, resolves bare column references through the
//! signal's field mapper, and hands `*If` predicates to the filter compiler
//! so they go through the same key resolution as WHERE clauses.
use sqlparser::ast::{Expr, FunctionArg, FunctionArgExpr, SelectItem, SetExpr, Statement};
use sqlparser::dialect::ClickHouseDialect;
use sqlparser::parser::Parser;
use telemetry::{field_key_from_text, FieldKeySelector, Registry, TelemetryFieldKey, TelemetryValue};

use crate::compiler::{compile_filter, CompileOptions};
use crate::error::QueryError;
use crate::mapper::{ConditionBuilder, FieldMapper};

/// Rewrites aggregation expressions for one signal.
pub struct AggExprRewriter<'a> {
    mapper: &'a dyn FieldMapper,
    builder: &'a dyn ConditionBuilder,
    opts: CompileOptions,
}

impl<'a> AggExprRewriter<'a> {
    pub fn new(
        mapper: &'a dyn FieldMapper,
        builder: &'a dyn ConditionBuilder,
        opts: CompileOptions,
    ) -> Self {
        // predicates inside aggregates always guard map reads, otherwise
        // absent keys count as zero-values
        Self {
            mapper,
            builder,
            opts: opts.with_exists_guards(),
        }
    }

    /// Rewrite a single aggregation expression. Returns the rewritten SQL
    /// and the arguments bound to its placeholders. Expressions that need
    /// no resolution come back unchanged with no arguments.
    pub fn rewrite(
        &self,
        expr: &str,
        rate_interval: u64,
        registry: &Registry,
    ) -> Result<(String, Vec<TelemetryValue>), QueryError> {
        let parsed = parse_expression(expr)?;
        let func = match parsed {
            Expr::Function(func) => func,
            // bare column expressions pass through untouched
            _ => return Ok((expr.to_string(), Vec::new())),
        };

        let name = func.name.to_string();
        let lower = name.to_lowercase();

        let mut args = Vec::with_capacity(func.args.len());
        for arg in &func.args {
            match arg {
                FunctionArg::Unnamed(FunctionArgExpr::Expr(e)) => args.push(e.clone()),
                // count(*) and friends need no rewriting
                _ => return Ok((expr.to_string(), Vec::new())),
            }
        }

        if lower == "rate" {
            return Ok((format!("count()/{}", rate_interval), Vec::new()));
        }

        if let Some(fraction) = quantile_fraction(&lower) {
            if args.is_empty() {
                return Err(QueryError::AggregationParse {
                    expr: expr.to_string(),
                    message: format!("{} expects a column argument", name),
                });
            }
            let (cols, _) = self.column_refs(&args, registry, expr)?;
            return Ok((format!("quantile({})({})", fraction, cols.join(", ")), Vec::new()));
        }

        if lower.ends_with("if") {
            let min_args = if lower == "countif" { 1 } else { 2 };
            if args.len() < min_args {
                return Err(QueryError::AggregationParse {
                    expr: expr.to_string(),
                    message: format!("{} expects at least {} arguments", name, min_args),
                });
            }
            let predicate = args[0].to_string();
            let fragment = compile_filter(&predicate, registry, self.builder, &self.opts)
                .map_err(|e| QueryError::rewrite(expr, e))?;
            let (cols, _) = self.column_refs(&args[1..], registry, expr)?;
            let mut parts = Vec::with_capacity(cols.len() + 1);
            parts.push(fragment.sql);
            parts.extend(cols);
            return Ok((format!("{}({})", name, parts.join(", ")), fragment.args));
        }

        if args.is_empty() {
            // count() and other zero-argument aggregates
            return Ok((expr.to_string(), Vec::new()));
        }

        let (cols, changed) = self.column_refs(&args, registry, expr)?;
        if !changed {
            return Ok((expr.to_string(), Vec::new()));
        }
        Ok((format!("{}({})", name, cols.join(", ")), Vec::new()))
    }

    /// Rewrite a batch. Failing entries keep their original text and the
    /// error messages are combined so callers can surface partial results.
    pub fn rewrite_multiple(
        &self,
        exprs: &[String],
        rate_interval: u64,
        registry: &Registry,
    ) -> (Vec<(String, Vec<TelemetryValue>)>, Option<QueryError>) {
        let mut results = Vec::with_capacity(exprs.len());
        let mut errors = Vec::new();
        for expr in exprs {
            match self.rewrite(expr, rate_interval, registry) {
                Ok(rewritten) => results.push(rewritten),
                Err(e) => {
                    errors.push(e.to_string());
                    results.push((expr.clone(), Vec::new()));
                }
            }
        }
        let combined = if errors.is_empty() {
            None
        } else {
            Some(QueryError::Batch(errors))
        };
        (results, combined)
    }

    /// Resolve each argument as a column reference, reporting whether any
    /// of them changed.
    fn column_refs(
        &self,
        args: &[Expr],
        registry: &Registry,
        expr: &str,
    ) -> Result<(Vec<String>, bool), QueryError> {
        let mut cols = Vec::with_capacity(args.len());
        let mut changed = false;
        for arg in args {
            match arg {
                Expr::Identifier(_) | Expr::CompoundIdentifier(_) => {
                    let text = arg.to_string();
                    let mapped = self
                        .column_ref(&text, registry)
                        .map_err(|e| QueryError::rewrite(expr, e))?;
                    if mapped != text {
                        changed = true;
                    }
                    cols.push(mapped);
                }
                other => cols.push(other.to_string()),
            }
        }
        Ok((cols, changed))
    }

    /// Resolve one column reference: the same selector parsing and
    /// ambiguity handling as WHERE-clause keys, so `resource.service.name`
    /// pins a context and an ambiguous name fans out into a `multiIf`
    /// instead of silently reading one physical key.
    fn column_ref(&self, name: &str, registry: &Registry) -> Result<String, QueryError> {
        let selector = FieldKeySelector::from_text(name);
        let entries: Vec<TelemetryFieldKey> = registry
            .get(&selector.name)
            .map(|keys| {
                keys.iter()
                    .filter(|entry| selector.matches(entry))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        let key = field_key_from_text(name);
        self.mapper.registry_field_for(&key, &entries, registry)
    }
}

fn parse_expression(expr: &str) -> Result<Expr, QueryError> {
    let sql = format!("SELECT {}", expr);
    let parse_err = |message: String| QueryError::AggregationParse {
        expr: expr.to_string(),
        message,
    };

    let statements = Parser::parse_sql(&ClickHouseDialect {}, &sql)
        .map_err(|e| parse_err(e.to_string()))?;
    let query = match statements.into_iter().next() {
        Some(Statement::Query(query)) => query,
        _ => return Err(parse_err("not an expression".to_string())),
    };
    let select = match *query.body {
        SetExpr::Select(select) => select,
        _ => return Err(parse_err("not an expression".to_string())),
    };
    match select.projection.into_iter().next() {
        Some(SelectItem::UnnamedExpr(e)) | Some(SelectItem::ExprWithAlias { expr: e, .. }) => Ok(e),
        _ => Err(parse_err("not an expression".to_string())),
    }
}

/// `p99` -> `0.99`, `p05` -> `0.05`. Single digits are left alone so user
/// defined functions like `p1` are not swallowed.
fn quantile_fraction(lower: &str) -> Option<String> {
    let digits = lower.strip_prefix('p')?;
    if digits.len() == 2 && digits.chars().all(|c| c.is_ascii_digit()) {
        Some(format!("0.{}", digits))
    } else {
        None
    }
}
