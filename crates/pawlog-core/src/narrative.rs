//! Templated weekly narrative.
//!
//! A section is rendered only when its metric is present; Meals, Walks,
//! and Sleep additionally require a non-zero average. Barking is always
//! rendered alongside any other section, because a zero count is itself
//! reassuring. A week with no section at all collapses to a single
//! "no records" sentence.

use crate::models::SummaryMetrics;
use crate::window::WeekWindow;

pub fn render(subject_name: &str, window: &WeekWindow, m: &SummaryMetrics) -> String {
    let mut sections: Vec<(&str, String)> = Vec::new();

    if let Some(rate) = m.toilet_fail_rate {
        sections.push((
            "Toilet",
            format!(
                "The toilet training failure rate this week was {}%. If the number of accidents \
                 increases over consecutive days, it may be worth reviewing the daily routine or \
                 checking your dog's physical condition.",
                rate
            ),
        ));
    }

    if let Some(food) = m.avg_food_grams.filter(|v| *v > 0.0) {
        sections.push((
            "Meals",
            format!(
                "Your dog ate an average of {}g of food per day. Appetite appears to be relatively \
                 stable, but if there were days with less intake than usual, factors such as \
                 physical condition or mood may have influenced it.",
                food
            ),
        ));
    }

    if let Some(minutes) = m.avg_walk_minutes.filter(|v| *v > 0.0) {
        sections.push((
            "Walks & Activity",
            format!(
                "Walks averaged {} minutes per day, covering approximately {} km. If this is \
                 significantly more or less than usual, it may indicate a change in activity level.",
                minutes,
                m.avg_walk_distance_km.unwrap_or(0.0)
            ),
        ));
    }

    if let Some(hours) = m.avg_sleep_hours.filter(|v| *v > 0.0) {
        sections.push((
            "Sleep",
            format!(
                "Your dog slept an average of {} hours per day. If there were days with notably \
                 less sleep, stress or environmental changes might be affecting their rest.",
                hours
            ),
        ));
    }

    if sections.is_empty() && m.bark_night_count == 0 {
        return format!(
            "No records were found for {} between {} and {}.",
            subject_name, window.start, window.end
        );
    }

    let bark = if m.bark_night_count > 0 {
        format!(
            "There were {} instances of nighttime barking. If night barking continues, it may be \
             helpful to check for environmental factors or external stimuli.",
            m.bark_night_count
        )
    } else {
        "There was no notable nighttime barking. It was a calm week overall.".to_string()
    };
    sections.push(("Barking", bark));

    let mut out = format!(
        "Here is {}'s weekly summary for the period {} to {}.",
        subject_name, window.start, window.end
    );
    for (title, body) in sections {
        out.push_str(&format!("\n\n【{}】\n{}", title, body));
    }
    out.push_str(&format!(
        "\n\nThis concludes the weekly summary for {}.\nIf any concerning patterns continue, \
         please keep monitoring them along with next week's records.",
        subject_name
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn window() -> WeekWindow {
        WeekWindow::containing(9, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap())
    }

    #[test]
    fn empty_week_is_single_sentence() {
        let text = render("Bori", &window(), &SummaryMetrics::default());
        assert_eq!(
            text,
            "No records were found for Bori between 2024-03-04 and 2024-03-10."
        );
    }

    #[test]
    fn zero_barks_is_reported_not_omitted() {
        let m = SummaryMetrics {
            toilet_fail_rate: Some(0.0),
            ..Default::default()
        };
        let text = render("Bori", &window(), &m);
        assert!(text.contains("【Toilet】"));
        assert!(text.contains("failure rate this week was 0%"));
        assert!(text.contains("no notable nighttime barking"));
    }

    #[test]
    fn absent_food_omits_meals_section() {
        let m = SummaryMetrics {
            avg_sleep_hours: Some(11.5),
            ..Default::default()
        };
        let text = render("Bori", &window(), &m);
        assert!(!text.contains("【Meals】"));
        assert!(text.contains("【Sleep】\nYour dog slept an average of 11.5 hours per day."));
    }

    #[test]
    fn zero_food_average_is_treated_as_absent() {
        let m = SummaryMetrics {
            avg_food_grams: Some(0.0),
            avg_walk_minutes: Some(0.0),
            avg_walk_distance_km: Some(0.0),
            ..Default::default()
        };
        let text = render("Bori", &window(), &m);
        assert!(text.starts_with("No records were found"));
    }

    #[test]
    fn full_layout() {
        let m = SummaryMetrics {
            avg_one_freq_day: Some(3.0),
            avg_two_freq_day: Some(1.0),
            toilet_fail_rate: Some(12.5),
            avg_food_grams: Some(180.0),
            avg_walk_minutes: Some(45.0),
            avg_walk_distance_km: Some(2.3),
            avg_sleep_hours: Some(12.0),
            bark_night_count: 2,
        };
        let text = render("Bori", &window(), &m);
        assert!(text.starts_with(
            "Here is Bori's weekly summary for the period 2024-03-04 to 2024-03-10.\n\n【Toilet】"
        ));
        assert!(text.contains("ate an average of 180g of food per day"));
        assert!(text.contains("Walks averaged 45 minutes per day, covering approximately 2.3 km."));
        assert!(text.contains("There were 2 instances of nighttime barking."));
        assert!(text.ends_with("along with next week's records."));

        let order: Vec<usize> = ["【Toilet】", "【Meals】", "【Walks & Activity】", "【Sleep】", "【Barking】"]
            .iter()
            .map(|h| text.find(h).unwrap())
            .collect();
        assert!(order.windows(2).all(|p| p[0] < p[1]));
    }
}
