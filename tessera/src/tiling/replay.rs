use std::fmt::Write;

use crate::{
    catalog::{CostOracle, TileCatalog, TileId},
    tiling::{Placement, Solution, SolveStatus, TilingProblem, TilingStrategy},
    Error,
};

/// Parses a replay record, one `tileId,x,y;` entry per line. Blank lines are
/// ignored and line numbers start at 1.
pub fn parse_record(record: &str) -> Result<Vec<(usize, TileId, i64, i64)>, Error> {
    let mut res = vec![];
    for (i, line) in record.lines().enumerate() {
        let line_num = i + 1;
        let err = |msg: String| Error::Replay {
            line: line_num,
            msg,
        };
        let line = line.trim();
        if line.is_empty() {
            continue
        }
        let Some(body) = line.strip_suffix(';') else {
            return Err(err(format!("\"{line}\" does not end with `;`")))
        };
        let fields: Vec<&str> = body.split(',').map(str::trim).collect();
        let [id, x, y] = fields[..] else {
            return Err(err(format!(
                "expected three comma separated fields, found {}",
                fields.len()
            )))
        };
        let id = id
            .parse::<u32>()
            .map_err(|e| err(format!("tile id \"{id}\": {e}")))?;
        let x = x
            .parse::<i64>()
            .map_err(|e| err(format!("x coordinate \"{x}\": {e}")))?;
        let y = y
            .parse::<i64>()
            .map_err(|e| err(format!("y coordinate \"{y}\": {e}")))?;
        res.push((line_num, TileId(id), x, y));
    }
    Ok(res)
}

/// Writes the placements of `solution` in the format [CsvReplay] reads
pub fn write_record(solution: &Solution) -> String {
    let mut s = String::new();
    for p in &solution.placements {
        // writing to a `String` cannot fail
        let _ = writeln!(s, "{},{},{};", p.tile, p.x, p.y);
    }
    s
}

/// Replays a recorded tiling against the catalog it was produced with
#[derive(Debug, Clone, Default)]
pub struct CsvReplay {
    pub record: String,
}

impl CsvReplay {
    pub fn new<S: Into<String>>(record: S) -> Self {
        Self {
            record: record.into(),
        }
    }
}

impl TilingStrategy for CsvReplay {
    fn name(&self) -> &str {
        "csv"
    }

    fn solve(
        &mut self,
        problem: &TilingProblem,
        catalog: &TileCatalog,
        oracle: &dyn CostOracle,
    ) -> Result<Solution, Error> {
        problem.validate()?;
        catalog.ensure_non_empty()?;
        let mut placements = vec![];
        for (line, tile, x, y) in parse_record(&self.record)? {
            let kind = *catalog.get(tile).ok_or_else(|| Error::Replay {
                line,
                msg: format!("tile id {tile} is not in the catalog of {} kinds", catalog.len()),
            })?;
            problem
                .check_placement(&kind, x, y)
                .map_err(|e| Error::Replay {
                    line,
                    msg: e.to_string(),
                })?;
            placements.push(Placement::new(tile, kind, x, y)?);
        }
        tracing::debug!(placements = placements.len(), "replayed tiling");
        Solution::finalize(placements, problem, oracle, SolveStatus::Replayed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parsing() {
        let entries = parse_record("0,1,2;\n\n  3,-1,0;\n").unwrap();
        assert_eq!(entries, vec![(1, TileId(0), 1, 2), (3, TileId(3), -1, 0)]);
        assert!(matches!(
            parse_record("0,1,2\n"),
            Err(Error::Replay { line: 1, .. })
        ));
        assert!(matches!(
            parse_record("0,1,2;\n0,1;\n"),
            Err(Error::Replay { line: 2, .. })
        ));
        assert!(matches!(
            parse_record("a,1,2;"),
            Err(Error::Replay { line: 1, .. })
        ));
    }
}
