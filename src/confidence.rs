use std::fmt;

/// Scores strictly above this percentage are high confidence.
pub const HIGH_THRESHOLD: f64 = 45.0;
/// Scores strictly above this percentage (and not high) are medium confidence.
pub const MEDIUM_THRESHOLD: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfidenceLabel {
    High,
    Medium,
    Low,
}

impl fmt::Display for ConfidenceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConfidenceLabel::High => "HIGH",
            ConfidenceLabel::Medium => "MEDIUM",
            ConfidenceLabel::Low => "LOW",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Confidence {
    pub label: ConfidenceLabel,
    pub color_hint: &'static str,
    /// Percentage the label was derived from
    pub percent: f64,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:.1}%)", self.label, self.percent)
    }
}

/// Bucket a percentage score in `[0, 100]`.
pub fn classify(percent: f64) -> Confidence {
    let (label, color_hint) = if percent > HIGH_THRESHOLD {
        (ConfidenceLabel::High, "#2c5f2d")
    } else if percent > MEDIUM_THRESHOLD {
        (ConfidenceLabel::Medium, "#ff9800")
    } else {
        (ConfidenceLabel::Low, "#d32f2f")
    };
    Confidence {
        label,
        color_hint,
        percent,
    }
}

/// Convert an upstream `[0, 1]` score to the one-decimal percentage that is
/// both displayed and classified.
pub fn score_to_percent(score: f64) -> f64 {
    (score * 1000.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundaries() {
        assert_eq!(classify(46.0).label, ConfidenceLabel::High);
        assert_eq!(classify(45.0).label, ConfidenceLabel::Medium);
        assert_eq!(classify(21.0).label, ConfidenceLabel::Medium);
        assert_eq!(classify(20.0).label, ConfidenceLabel::Low);
        assert_eq!(classify(0.0).label, ConfidenceLabel::Low);
        assert_eq!(classify(100.0).label, ConfidenceLabel::High);
    }

    #[test]
    fn test_fractional_boundaries() {
        assert_eq!(classify(45.1).label, ConfidenceLabel::High);
        assert_eq!(classify(20.1).label, ConfidenceLabel::Medium);
    }

    #[test]
    fn test_non_increasing_as_score_drops() {
        let rank = |l: ConfidenceLabel| match l {
            ConfidenceLabel::High => 2,
            ConfidenceLabel::Medium => 1,
            ConfidenceLabel::Low => 0,
        };
        let mut previous = rank(classify(100.0).label);
        for tenth in (0..=1000).rev() {
            let current = rank(classify(tenth as f64 / 10.0).label);
            assert!(current <= previous);
            previous = current;
        }
    }

    #[test]
    fn test_colors() {
        assert_eq!(classify(90.0).color_hint, "#2c5f2d");
        assert_eq!(classify(30.0).color_hint, "#ff9800");
        assert_eq!(classify(5.0).color_hint, "#d32f2f");
    }

    #[test]
    fn test_rounding_happens_before_classification() {
        // 0.45049 shows as 45.0% and must not be labelled high
        let percent = score_to_percent(0.45049);
        assert_eq!(percent, 45.0);
        assert_eq!(classify(percent).label, ConfidenceLabel::Medium);
    }

    #[test]
    fn test_display() {
        assert_eq!(classify(score_to_percent(0.52)).to_string(), "HIGH (52.0%)");
        assert_eq!(classify(12.34).to_string(), "LOW (12.3%)");
    }
}
