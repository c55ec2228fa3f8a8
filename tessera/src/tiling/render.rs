use std::{fmt::Write, fs, path::Path};

use crate::{
    tiling::{Solution, TilingProblem},
    Error,
};

// gray, blue, cyan, green, yellow, peach, magenta, purple
const COLORS: [&str; 8] = [
    "a0a0a0", "00b2ff", "00cb9d", "2ab90f", "c49d00", "ff8080", "ff2adc", "a35bff",
];
const CELL: i64 = 32;
const PAD: i64 = 64;
const TEXT_COLOR: &str = "a0a0a0";
const FONT_FAMILY: &str = "monospace";

fn escape(s: &str) -> String {
    // "&" first
    s.replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Draws the partial product grid with every placed block on top of it, in
/// the usual orientation where `x` grows to the left. Cells below the
/// truncation line are shaded.
pub fn render_solution(solution: &Solution, problem: &TilingProblem) -> String {
    let (wx, wy) = (problem.wx as i64, problem.wy as i64);
    let mut s = String::new();
    // writing to a `String` cannot fail, so results are dropped below
    let _ = write!(
        s,
        "<rect fill=\"#000\" x=\"0\" y=\"0\" width=\"{}\" height=\"{}\"/>",
        wx * CELL,
        wy * CELL
    );
    for (x, y) in problem.cells() {
        let fill = if x + y < solution.actual_lsb {
            "2a2a2a"
        } else {
            "171717"
        };
        let _ = writeln!(
            s,
            "<rect fill=\"#{fill}\" stroke=\"#333\" x=\"{}\" y=\"{}\" width=\"{CELL}\" \
             height=\"{CELL}\"/>",
            (wx - 1 - x as i64) * CELL,
            y as i64 * CELL,
        );
    }
    for (i, p) in solution.placements.iter().enumerate() {
        let color = COLORS[i % COLORS.len()];
        let (ax, ay) = p.anchor();
        for block in p.kind.blocks() {
            let x0 = ax + i64::from(block.dx);
            let y0 = ay + i64::from(block.dy);
            let w = i64::from(block.width);
            let h = i64::from(block.height);
            let _ = writeln!(
                s,
                "<rect fill=\"#{color}\" fill-opacity=\"0.5\" stroke=\"#{color}\" \
                 stroke-width=\"2\" x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\"/>",
                (wx - x0 - w) * CELL + 2,
                y0 * CELL + 2,
                w * CELL - 4,
                h * CELL - 4,
            );
        }
        let _ = writeln!(
            s,
            "<text fill=\"#{TEXT_COLOR}\" font-size=\"{}\" font-family=\"{FONT_FAMILY}\" x=\"{}\" \
             y=\"{}\">{}</text>",
            CELL / 2,
            (wx - ax - i64::from(p.kind.width())) * CELL + 4,
            ay * CELL + CELL / 2,
            escape(&p.kind.to_string()),
        );
    }
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"no\"?>\n\
        <!DOCTYPE svg PUBLIC \"-//W3C//DTD SVG 1.1//EN\" \
        \"http://www.w3.org/Graphics/SVG/1.1/DTD/svg11.dtd\">\n\
        <svg preserveAspectRatio=\"meet\" viewBox=\"{} {} {} {}\" width=\"100%\" height=\"100%\" \
        version=\"1.1\" xmlns=\"http://www.w3.org/2000/svg\">\n\
        {s}\n\
        </svg>",
        -PAD,
        -PAD,
        wx * CELL + 2 * PAD,
        wy * CELL + 2 * PAD,
    )
}

impl Solution {
    /// Writes [render_solution] to `path`, replacing the file
    pub fn render_to_svg_file<P: AsRef<Path>>(
        &self,
        problem: &TilingProblem,
        path: P,
    ) -> Result<(), Error> {
        fs::write(path.as_ref(), render_solution(self, problem)).map_err(|e| {
            Error::OtherString(format!(
                "could not write {}: {e}",
                path.as_ref().display()
            ))
        })
    }
}
