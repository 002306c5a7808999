use crate::models::{DEFAULT_SCORE, Emotion, Record};
use chrono::NaiveDate;
use serde::Serialize;

pub const DEFAULT_DAY_SUMMARY: &str = "Diary entry";

/// One calendar cell: every valid record of a day collapsed into one mood.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayAggregate {
    pub date: NaiveDate,
    #[serde(rename = "emotion")]
    pub final_emotion: Option<Emotion>,
    pub emotion_emoji: Option<String>,
    pub emotion_score: Option<u8>,
    pub summary: Option<String>,
    pub has_record: bool,
    pub record_count: usize,
}

impl DayAggregate {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            final_emotion: None,
            emotion_emoji: None,
            emotion_score: None,
            summary: None,
            has_record: false,
            record_count: 0,
        }
    }
}

/// Collapses the records of `date` into a single aggregate.
///
/// Records with blank content are ignored. Records are visited in
/// `(date, created_at, id)` order, which fixes both the dominant-emotion
/// tie-break and the choice of summary.
pub fn aggregate_day(date: NaiveDate, records: &[Record]) -> DayAggregate {
    let mut day_records = records
        .iter()
        .filter(|record| record.has_content())
        .collect::<Vec<_>>();

    if day_records.is_empty() {
        return DayAggregate::empty(date);
    }

    day_records.sort_by(|left, right| {
        left.date
            .cmp(&right.date)
            .then_with(|| left.created_at.cmp(&right.created_at))
            .then_with(|| left.id.cmp(&right.id))
    });

    let avg_score = average_score(day_records.iter().map(|record| record.emotion_score));
    let dominant = dominant_emotion(day_records.iter().filter_map(|record| record.emotion));
    let final_emotion = resolve_emotion(avg_score, dominant);

    DayAggregate {
        date,
        final_emotion: Some(final_emotion),
        emotion_emoji: Some(final_emotion.emoji().to_string()),
        emotion_score: Some(avg_score.round().clamp(0.0, 100.0) as u8),
        summary: Some(latest_summary(&day_records)),
        has_record: true,
        record_count: day_records.len(),
    }
}

/// Mean of the present scores, or 50 when none is present.
pub fn average_score(scores: impl Iterator<Item = Option<u8>>) -> f64 {
    let (sum, count) = scores
        .flatten()
        .fold((0_u64, 0_u64), |(sum, count), score| {
            (sum + u64::from(score.min(100)), count + 1)
        });

    if count == 0 {
        f64::from(DEFAULT_SCORE)
    } else {
        sum as f64 / count as f64
    }
}

/// Most frequent label; on a tie the label seen first wins. `Neutral` when empty.
pub fn dominant_emotion(emotions: impl Iterator<Item = Emotion>) -> Emotion {
    let counts = emotions.fold(Vec::<(Emotion, usize)>::new(), |mut acc, emotion| {
        match acc.iter_mut().find(|(seen, _)| *seen == emotion) {
            Some((_, count)) => *count += 1,
            None => acc.push((emotion, 1)),
        }
        acc
    });

    counts
        .into_iter()
        .fold(None, |best: Option<(Emotion, usize)>, (emotion, count)| match best {
            Some((_, best_count)) if best_count >= count => best,
            _ => Some((emotion, count)),
        })
        .map(|(emotion, _)| emotion)
        .unwrap_or(Emotion::Neutral)
}

/// Score dominates at the extremes, the categorical mode in the middle.
///
/// | average       | result                                   |
/// |---------------|------------------------------------------|
/// | `>= 70`       | Happy                                    |
/// | `<= 30`       | Sad                                      |
/// | `[40, 60)`    | Anxious/Stressed kept, otherwise Neutral |
/// | anything else | the dominant label                       |
pub fn resolve_emotion(avg_score: f64, dominant: Emotion) -> Emotion {
    if avg_score >= 70.0 {
        Emotion::Happy
    } else if avg_score <= 30.0 {
        Emotion::Sad
    } else if (40.0..60.0).contains(&avg_score) {
        match dominant {
            Emotion::Anxious | Emotion::Stressed => dominant,
            _ => Emotion::Neutral,
        }
    } else {
        dominant
    }
}

// `records` is sorted ascending; the last maximum is the latest, but equal
// timestamps keep the earliest inserted record.
fn latest_summary(records: &[&Record]) -> String {
    let latest = records.iter().copied().fold(None::<&Record>, |best, record| match best {
        Some(current) if (current.date, current.created_at) >= (record.date, record.created_at) => {
            Some(current)
        }
        _ => Some(record),
    });

    latest
        .and_then(|record| record.summary.as_deref())
        .map(str::trim)
        .filter(|summary| !summary.is_empty())
        .unwrap_or(DEFAULT_DAY_SUMMARY)
        .to_string()
}
