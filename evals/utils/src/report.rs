//! 评估报告输出.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::iter;
use std::path::Path;

use tube_berry::metrics::MetricKind;

use crate::runner::CaseRecord;

/// 将评估结果表写进 `w` 中.
///
/// 首行为表头 `/case/, /列名/, ...`; 之后每个病例一行,
/// 病例名后跟保留六位小数的指标值, 以 `, ` 分隔.
pub fn render_into<W: Write>(
    w: &mut W,
    metrics: &[MetricKind],
    records: &[CaseRecord],
) -> io::Result<()> {
    let header: Vec<String> = iter::once("/case/".to_owned())
        .chain(metrics.iter().map(|m| format!("/{}/", m.column())))
        .collect();
    writeln!(w, "{}", header.join(", "))?;

    for record in records {
        let row: Vec<String> = iter::once(record.name.clone())
            .chain(record.values.iter().map(|v| format!("{v:.6}")))
            .collect();
        writeln!(w, "{}", row.join(", "))?;
    }
    Ok(())
}

/// 将评估结果表写入 `path`.
///
/// 只应在所有病例全部成功后调用: 失败的批次不留下部分报告.
pub fn write_report(
    path: &Path,
    metrics: &[MetricKind],
    records: &[CaseRecord],
) -> io::Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    render_into(&mut w, metrics, records)?;
    w.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_exact_bytes() {
        let metrics = [MetricKind::Dice, MetricKind::TreeLength];
        let records = [
            CaseRecord {
                name: "case01".to_owned(),
                values: vec![0.5, 123.456789],
            },
            CaseRecord {
                name: "case02".to_owned(),
                values: vec![1.0, 0.0],
            },
        ];

        let mut buf = Vec::new();
        render_into(&mut buf, &metrics, &records).unwrap();
        assert_eq!(
            std::str::from_utf8(&buf).unwrap(),
            "/case/, /dice/, /tree_length/\n\
             case01, 0.500000, 123.456789\n\
             case02, 1.000000, 0.000000\n"
        );
    }

    #[test]
    fn test_render_nan_sentinel() {
        let metrics = [MetricKind::CenlineDistFalseNegative];
        let records = [CaseRecord {
            name: "empty".to_owned(),
            values: vec![f64::NAN],
        }];

        let mut buf = Vec::new();
        render_into(&mut buf, &metrics, &records).unwrap();
        assert_eq!(
            std::str::from_utf8(&buf).unwrap(),
            "/case/, /cenline_dist_fn_error/\nempty, NaN\n"
        );
    }

    #[test]
    fn test_write_report_roundtrip() {
        let mut path = std::env::temp_dir();
        path.push(format!("tube-berry-report-{}.csv", std::process::id()));

        let metrics = [MetricKind::Completeness];
        let records = [CaseRecord {
            name: "case07".to_owned(),
            values: vec![0.875],
        }];
        write_report(&path, &metrics, &records).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "/case/, /completeness/\ncase07, 0.875000\n");

        std::fs::remove_file(&path).unwrap();
    }
}
