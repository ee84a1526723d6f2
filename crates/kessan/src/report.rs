//! Rendering of pipeline reports as text and JSON.

use std::fmt::Write as _;

use serde_json::{Value, json};

use kessan_core::{
    AggregateFinancials, Extraction, KessanError, Period, RatioKind, RatioResult, Result, round2,
};

use crate::pipeline::{FilingOutcome, PipelineReport};

/// Formats a ratio as a two-decimal percentage, or `undefined`.
#[must_use]
pub fn format_ratio(ratio: &RatioResult) -> String {
    match ratio {
        Ok(percent) => format!("{:.2}%", round2(*percent)),
        Err(_) => "undefined".to_string(),
    }
}

/// One line per ratio with its health interpretation.
fn ratio_lines(out: &mut String, agg: &AggregateFinancials) {
    for kind in RatioKind::ALL {
        let ratio = agg.ratio(kind);
        let verdict = match ratio {
            Ok(p) if kind.is_healthy(p) => "healthy",
            Ok(_) => "weak",
            Err(_) => "zero denominator",
        };
        let _ = writeln!(
            out,
            "  {kind} ({}): {} [{verdict}; {}]",
            kind.japanese_name(),
            format_ratio(&ratio),
            kind.criterion()
        );
    }
}

fn extraction_block(out: &mut String, period: Period, result: &Result<Extraction>) -> Result<()> {
    match result {
        Ok(extraction) => {
            let _ = match extraction.scope_fallback {
                Some(fallback) => writeln!(
                    out,
                    "[{period}] {} (no {} rows)",
                    fallback.used, fallback.requested
                ),
                None => writeln!(out, "[{period}] {}", extraction.scope_used),
            };
            let frame = extraction.snapshot.to_frame()?;
            let _ = writeln!(out, "{frame}");
        }
        Err(e) => {
            let _ = writeln!(out, "[{period}] error: {e}");
        }
    }
    Ok(())
}

/// Renders per-filing tables followed by per-period ratio lines.
///
/// # Errors
/// Returns an error if a snapshot cannot be rendered as a frame.
pub fn render_text(report: &PipelineReport) -> Result<String> {
    let mut out = String::new();

    for filing in &report.filings {
        let _ = writeln!(out, "== {} ==", filing.doc_id);
        for period in Period::ALL {
            extraction_block(&mut out, period, filing.get(period))?;
        }
        out.push('\n');
    }

    for period in Period::ALL {
        let agg = report.aggregate(period);
        let _ = writeln!(
            out,
            "{period} period: {} filing(s), total assets {}, total liabilities {}",
            agg.filings, agg.total_assets, agg.total_liabilities
        );
        ratio_lines(&mut out, agg);
    }

    Ok(out)
}

fn ratio_value(ratio: &RatioResult) -> Value {
    ratio.map_or(Value::Null, |p| json!(round2(p)))
}

fn aggregate_json(agg: &AggregateFinancials) -> Value {
    json!({
        "filings": agg.filings,
        "totals": agg.totals,
        "totalAssets": agg.total_assets,
        "totalLiabilities": agg.total_liabilities,
        "currentRatio": ratio_value(&agg.current_ratio),
        "equityRatio": ratio_value(&agg.equity_ratio),
        "fixedRatio": ratio_value(&agg.fixed_ratio),
    })
}

fn result_json(result: &Result<Extraction>) -> Value {
    match result {
        Ok(extraction) => json!({ "ok": extraction }),
        Err(e) => json!({ "error": error_json(e) }),
    }
}

fn error_json(error: &KessanError) -> Value {
    json!({ "message": error.to_string(), "transient": error.is_transient() })
}

fn filing_json(filing: &FilingOutcome) -> Value {
    json!({
        "docId": filing.doc_id,
        "prior": result_json(&filing.prior),
        "current": result_json(&filing.current),
    })
}

/// Renders the report as JSON; undefined ratios become `null`.
#[must_use]
pub fn to_json(report: &PipelineReport) -> Value {
    json!({
        "filings": report.filings.iter().map(filing_json).collect::<Vec<_>>(),
        "prior": aggregate_json(&report.prior),
        "current": aggregate_json(&report.current),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kessan_core::{BalanceSheetSnapshot, ConsolidationScope, DocId, ScopeFallback};

    fn outcome(id: &str, snapshot: BalanceSheetSnapshot) -> FilingOutcome {
        let extraction = |period| Extraction {
            period,
            scope_used: ConsolidationScope::Consolidated,
            scope_fallback: Some(ScopeFallback {
                requested: ConsolidationScope::Individual,
                used: ConsolidationScope::Consolidated,
            }),
            snapshot,
        };
        FilingOutcome {
            doc_id: DocId::new(id),
            prior: Err(KessanError::Schema {
                column: "値".to_string(),
            }),
            current: Ok(extraction(Period::Current)),
        }
    }

    #[test]
    fn test_format_ratio() {
        assert_eq!(format_ratio(&Ok(280.725_4)), "280.73%");
        assert_eq!(format_ratio(&Ok(62.5)), "62.50%");
        assert_eq!(
            format_ratio(&Err(kessan_core::RatioUndefined {
                ratio: RatioKind::Fixed
            })),
            "undefined"
        );
    }

    #[test]
    fn test_render_text() {
        let report = PipelineReport::from_outcomes(vec![outcome(
            "S100ABCD",
            BalanceSheetSnapshot::new(100, 50, 40, 30, 0),
        )]);
        let text = render_text(&report).unwrap();

        assert!(text.contains("== S100ABCD =="));
        assert!(text.contains("[prior] error: Schema error"));
        assert!(text.contains("[current] consolidated (no individual rows)"));
        assert!(text.contains("current period: 1 filing(s), total assets 150, total liabilities 70"));
        assert!(text.contains("current ratio (流動比率): 250.00% [healthy"));
        assert!(text.contains("fixed ratio (固定比率): undefined [zero denominator"));
        assert!(text.contains("prior period: 0 filing(s)"));
    }

    #[test]
    fn test_to_json() {
        let report = PipelineReport::from_outcomes(vec![outcome(
            "S100ABCD",
            BalanceSheetSnapshot::new(100, 50, 40, 30, 80),
        )]);
        let value = to_json(&report);

        assert_eq!(value["filings"][0]["docId"], "S100ABCD");
        assert!(value["filings"][0]["prior"]["error"]["message"].is_string());
        assert_eq!(value["current"]["currentRatio"], 250.0);
        assert_eq!(value["current"]["fixedRatio"], 62.5);
        assert!(value["prior"]["currentRatio"].is_null());
    }
}
