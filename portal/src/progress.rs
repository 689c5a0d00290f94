//! Course progress arithmetic.

/// Percentage of lessons completed, rounded to the nearest integer. An empty course is 0%.
pub fn percent(completed: i64, total: i64) -> i32 {
    if total <= 0 {
        return 0;
    }
    let completed = completed.clamp(0, total);
    ((completed as f64 / total as f64) * 100.0).round() as i32
}

/// Whether a progress value counts as finishing the course.
pub fn is_complete(progress: i32) -> bool {
    progress >= 100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_course_is_zero() {
        assert_eq!(percent(0, 0), 0);
        assert_eq!(percent(3, 0), 0);
    }

    #[test]
    fn test_rounding() {
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(1, 2), 50);
        assert_eq!(percent(3, 3), 100);
    }

    #[test]
    fn test_complete_threshold() {
        assert!(is_complete(percent(4, 4)));
        assert!(!is_complete(percent(3, 4)));
    }
}
