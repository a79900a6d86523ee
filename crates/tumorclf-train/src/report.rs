//! Confusion-matrix rendering for run diagnostics.

use tumorclf_core::ConfusionMatrix;

const CELL: usize = 120;
const MARGIN_LEFT: usize = 90;
const MARGIN_TOP: usize = 70;
const MARGIN_BOTTOM: usize = 70;

/// Render `matrix` as an annotated heatmap in SVG.
///
/// Rows are actual labels, columns predicted labels. The title carries the
/// accuracy with two decimals.
pub fn render_confusion_matrix(matrix: &ConfusionMatrix, accuracy: f64) -> String {
    let labels = matrix.labels();
    let counts = matrix.counts();
    let n = labels.len();
    let width = MARGIN_LEFT + n * CELL + 30;
    let height = MARGIN_TOP + n * CELL + MARGIN_BOTTOM;
    let max = counts.iter().flatten().copied().max().unwrap_or(0).max(1);

    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}" font-family="sans-serif">
<rect width="{w}" height="{h}" fill="white"/>
<text x="{cx}" y="35" font-size="18" text-anchor="middle">Confusion Matrix (Acc: {acc:.2})</text>
"#,
        w = width,
        h = height,
        cx = MARGIN_LEFT + n * CELL / 2,
        acc = accuracy,
    );

    for (row, actual) in counts.iter().enumerate() {
        for (col, count) in actual.iter().enumerate() {
            let x = MARGIN_LEFT + col * CELL;
            let y = MARGIN_TOP + row * CELL;
            let intensity = *count as f64 / max as f64;
            let text_fill = if intensity > 0.5 { "white" } else { "black" };
            svg.push_str(&format!(
                r#"<rect x="{x}" y="{y}" width="{CELL}" height="{CELL}" fill="{fill}" stroke="white"/>
<text x="{tx}" y="{ty}" font-size="22" text-anchor="middle" dominant-baseline="middle" fill="{text_fill}">{count}</text>
"#,
                fill = blue(intensity),
                tx = x + CELL / 2,
                ty = y + CELL / 2,
            ));
        }
    }

    for (i, label) in labels.iter().enumerate() {
        // column ticks below the grid, row ticks left of it
        svg.push_str(&format!(
            r#"<text x="{x}" y="{y}" font-size="14" text-anchor="middle">{label}</text>
<text x="{rx}" y="{ry}" font-size="14" text-anchor="end" dominant-baseline="middle">{label}</text>
"#,
            x = MARGIN_LEFT + i * CELL + CELL / 2,
            y = MARGIN_TOP + n * CELL + 20,
            rx = MARGIN_LEFT - 10,
            ry = MARGIN_TOP + i * CELL + CELL / 2,
        ));
    }

    svg.push_str(&format!(
        r#"<text x="{px}" y="{py}" font-size="15" text-anchor="middle">Predicted</text>
<text x="25" y="{ay}" font-size="15" text-anchor="middle" transform="rotate(-90 25 {ay})">Actual</text>
</svg>
"#,
        px = MARGIN_LEFT + n * CELL / 2,
        py = MARGIN_TOP + n * CELL + 50,
        ay = MARGIN_TOP + n * CELL / 2,
    ));

    svg
}

/// White to dark blue.
fn blue(intensity: f64) -> String {
    let t = intensity.clamp(0.0, 1.0);
    let lerp = |from: f64, to: f64| (from + (to - from) * t).round() as u8;
    format!(
        "#{:02x}{:02x}{:02x}",
        lerp(247.0, 8.0),
        lerp(251.0, 48.0),
        lerp(255.0, 107.0)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn svg_carries_title_axes_and_counts() {
        let cm = ConfusionMatrix::from_predictions(&[0, 0, 1, 1, 1], &[0, 1, 1, 1, 1]).unwrap();
        let svg = render_confusion_matrix(&cm, 0.8);

        assert!(svg.starts_with("<svg"));
        assert!(svg.trim_end().ends_with("</svg>"));
        assert!(svg.contains("Confusion Matrix (Acc: 0.80)"));
        assert!(svg.contains(">Predicted</text>"));
        assert!(svg.contains(">Actual</text>"));
        assert!(svg.contains(">3</text>"));
        assert_eq!(svg.matches("<rect").count(), 1 + 4);
    }

    #[test]
    fn color_scale_endpoints() {
        assert_eq!(blue(0.0), "#f7fbff");
        assert_eq!(blue(1.0), "#08306b");
    }
}
