//! Euclidean rhythm generation via Bjorklund's algorithm: distribute
//! `pulses` onsets over `steps` slots as evenly as possible. The output
//! is rotated so that the pattern always starts on an onset.

use crate::grammar::GrammarError;

/// Binary onset pattern of length `steps` with exactly `pulses` ones.
///
/// Fails when `pulses > steps`; `steps == 0` yields an empty pattern.
pub fn bjorklund(steps: usize, pulses: usize) -> Result<Vec<u8>, GrammarError> {
    if pulses > steps {
        return Err(GrammarError::PulsesExceedSteps { pulses, steps });
    }
    if steps == 0 {
        return Ok(Vec::new());
    }
    if pulses == 0 {
        return Ok(vec![0; steps]);
    }

    let mut counts: Vec<usize> = Vec::new();
    let mut remainders: Vec<usize> = vec![pulses];
    let mut divisor = steps - pulses;
    let mut level = 0usize;
    loop {
        counts.push(divisor / remainders[level]);
        remainders.push(divisor % remainders[level]);
        divisor = remainders[level];
        level += 1;
        if remainders[level] <= 1 {
            break;
        }
    }
    counts.push(divisor);

    let mut pattern: Vec<u8> = Vec::with_capacity(steps);
    build(&mut pattern, &counts, &remainders, level as isize);

    // rotate so slot 0 carries an onset
    let first = pattern.iter().position(|&b| b == 1).unwrap_or(0);
    pattern.rotate_left(first);
    Ok(pattern)
}

fn build(pattern: &mut Vec<u8>, counts: &[usize], remainders: &[usize], level: isize) {
    if level == -1 {
        pattern.push(0);
    } else if level == -2 {
        pattern.push(1);
    } else {
        for _ in 0..counts[level as usize] {
            build(pattern, counts, remainders, level - 1);
        }
        if remainders[level as usize] != 0 {
            build(pattern, counts, remainders, level - 2);
        }
    }
}

/// `[ x . . x . . x . ]` style rendering for log output.
pub fn rhythm_string(pattern: &[u8]) -> String {
    let mut s = String::from("[ ");
    for &beat in pattern {
        s.push_str(if beat == 1 { "x " } else { ". " });
    }
    s.push(']');
    s
}

/// Compact `E(pulses,steps)` form.
pub fn form_string(pulses: usize, steps: usize) -> String {
    format!("E({},{})", pulses, steps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_three_eight() {
        // the classic tresillo: onsets at slots 0, 3, 6
        let pattern = bjorklund(8, 3).unwrap();
        assert_eq!(pattern, vec![1, 0, 0, 1, 0, 0, 1, 0]);
    }

    #[test]
    fn test_five_thirteen_is_maximally_even() {
        let pattern = bjorklund(13, 5).unwrap();
        assert_eq!(pattern.len(), 13);
        assert_eq!(pattern.iter().filter(|&&b| b == 1).count(), 5);
        assert_eq!(pattern[0], 1);
        // gaps between consecutive onsets differ by at most one step
        let onsets: Vec<usize> = pattern
            .iter()
            .enumerate()
            .filter(|&(_, &b)| b == 1)
            .map(|(i, _)| i)
            .collect();
        let mut gaps: Vec<usize> = onsets.windows(2).map(|w| w[1] - w[0]).collect();
        gaps.push(13 - onsets[onsets.len() - 1] + onsets[0]);
        let min = *gaps.iter().min().unwrap();
        let max = *gaps.iter().max().unwrap();
        assert!(max - min <= 1, "gaps {:?}", gaps);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(bjorklund(0, 0).unwrap().is_empty());
        assert_eq!(bjorklund(4, 0).unwrap(), vec![0, 0, 0, 0]);
        assert_eq!(bjorklund(4, 4).unwrap(), vec![1, 1, 1, 1]);
        assert!(matches!(
            bjorklund(3, 5),
            Err(GrammarError::PulsesExceedSteps { pulses: 5, steps: 3 })
        ));
    }

    #[test]
    fn test_strings() {
        let pattern = bjorklund(8, 3).unwrap();
        assert_eq!(rhythm_string(&pattern), "[ x . . x . . x . ]");
        assert_eq!(form_string(3, 8), "E(3,8)");
    }
}
