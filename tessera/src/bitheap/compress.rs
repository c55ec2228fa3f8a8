use crate::Error;

/// The counters applied to one column in one stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Counters {
    /// 3:2 counters, each removes three bits and puts a sum bit back into the
    /// column and a carry into the next one
    pub full: u32,
    /// 2:2 counters
    pub half: u32,
}

impl Counters {
    pub fn is_empty(&self) -> bool {
        (self.full == 0) && (self.half == 0)
    }
}

/// A compression schedule. `stages[s][i]` are the counters applied to
/// column `lsb + i` in stage `s`. After the last stage every column holds at
/// most two bits, which a final carry propagate adder sums.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompressionPlan {
    pub lsb: usize,
    pub stages: Vec<Vec<Counters>>,
}

/// Stages are capped so that a plan that does not converge is reported
/// instead of looping
const MAX_STAGES: usize = 256;

impl CompressionPlan {
    /// The Dadda schedule for the column `heights` starting at `lsb`. Every
    /// stage reduces each column to the next lower height of the sequence
    /// `2, 3, 4, 6, 9, 13, ...`, counting the carries coming in from the
    /// column below.
    pub fn dadda(lsb: usize, heights: &[usize]) -> Result<Self, Error> {
        let mut plan = Self {
            lsb,
            stages: vec![],
        };
        let mut heights = heights.to_vec();
        while heights.iter().any(|&h| h > 2) {
            if plan.stages.len() >= MAX_STAGES {
                return Err(Error::OtherStr("Dadda reduction did not converge"))
            }
            let max = heights.iter().copied().max().unwrap_or(0);
            let mut target = 2;
            while target * 3 / 2 < max {
                target = target * 3 / 2;
            }
            let mut stage = vec![Counters::default(); heights.len()];
            let mut carries = 0;
            for (i, counters) in stage.iter_mut().enumerate() {
                let mut avail = heights[i];
                let mut h = heights[i] + carries;
                while h > target {
                    if (h - target >= 2) && (avail >= 3) {
                        counters.full += 1;
                        avail -= 3;
                        h -= 2;
                    } else if avail >= 2 {
                        counters.half += 1;
                        avail -= 2;
                        h -= 1;
                    } else {
                        break
                    }
                }
                carries = (counters.full + counters.half) as usize;
            }
            heights = Self::apply_stage(&heights, &stage)?;
            plan.stages.push(stage);
        }
        Ok(plan)
    }

    /// Heights after one stage. Carries out of the last column are dropped.
    fn apply_stage(heights: &[usize], stage: &[Counters]) -> Result<Vec<usize>, Error> {
        let mut next = heights.to_vec();
        for (i, c) in stage.iter().enumerate() {
            let (full, half) = (c.full as usize, c.half as usize);
            if i >= heights.len() {
                if !c.is_empty() {
                    return Err(Error::OtherString(format!(
                        "counters in column offset {i} which is past the heap"
                    )))
                }
                continue
            }
            if 3 * full + 2 * half > heights[i] {
                return Err(Error::OtherString(format!(
                    "{full} full and {half} half adders need more than the {} bits of column \
                     offset {i}",
                    heights[i]
                )))
            }
            next[i] -= 2 * full + half;
            if i + 1 < next.len() {
                next[i + 1] += full + half;
            }
        }
        Ok(next)
    }

    /// Checks the plan against the column `heights` of a heap starting at
    /// `lsb`, returning the final heights
    pub fn validate(&self, lsb: usize, heights: &[usize]) -> Result<Vec<usize>, Error> {
        let mut heights = heights.to_vec();
        for s in 0..self.stages.len() {
            // realign the stage to the heap
            let mut stage = vec![Counters::default(); heights.len()];
            for (i, c) in self.stages[s].iter().enumerate() {
                let column = self.lsb + i;
                if c.is_empty() {
                    continue
                }
                match column.checked_sub(lsb).filter(|&j| j < heights.len()) {
                    Some(j) => stage[j] = *c,
                    None => {
                        return Err(Error::OtherString(format!(
                            "stage {s} has counters in column {column} outside of the heap"
                        )))
                    }
                }
            }
            heights = Self::apply_stage(&heights, &stage)?;
        }
        if let Some(i) = heights.iter().position(|&h| h > 2) {
            return Err(Error::OtherString(format!(
                "column {} still holds {} bits after compression",
                lsb + i,
                heights[i]
            )))
        }
        Ok(heights)
    }

    pub fn full_adders(&self) -> u64 {
        self.stages.iter().flatten().map(|c| u64::from(c.full)).sum()
    }

    pub fn half_adders(&self) -> u64 {
        self.stages.iter().flatten().map(|c| u64::from(c.half)).sum()
    }

    /// Removes trailing stages without counters
    pub fn trim(&mut self) {
        while self
            .stages
            .last()
            .is_some_and(|stage| stage.iter().all(Counters::is_empty))
        {
            self.stages.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dadda() {
        let heights = [1, 2, 3, 4, 3, 2, 1];
        let plan = CompressionPlan::dadda(0, &heights).unwrap();
        let fin = plan.validate(0, &heights).unwrap();
        assert!(fin.iter().all(|&h| h <= 2));
        // every full adder removes one bit in total, carries out of the top
        // column remove the rest
        let before: usize = heights.iter().sum();
        let after: usize = fin.iter().sum();
        assert!(before - after >= plan.full_adders() as usize);
        assert!(CompressionPlan::dadda(3, &[2, 1, 2])
            .unwrap()
            .stages
            .is_empty());
        let bad = CompressionPlan {
            lsb: 0,
            stages: vec![vec![Counters { full: 1, half: 0 }]],
        };
        assert!(bad.validate(0, &[2]).is_err());
        assert!(bad.validate(1, &[3]).is_err());
    }
}
