//! Lenient extraction of the label pair from free-form model output.
//!
//! Models rarely answer in exactly the requested shape, so the scanner looks
//! for a marker per axis on each line and picks the first recognized token
//! after it. Whatever is still unknown at the end falls back to
//! `(notification, normal)`.

use crate::domain::{Category, Classification, Urgency};

const CATEGORY_MARKERS: &[&str] = &["category:", "type:", "类型:"];
const URGENCY_MARKERS: &[&str] = &["urgency:", "priority:", "紧急:"];

#[derive(Debug, Default)]
pub struct LabelScanner {
    category: Option<Category>,
    urgency: Option<Urgency>,
}

impl LabelScanner {
    pub fn feed_line(&mut self, line: &str) {
        let line = line.trim().to_lowercase().replace('：', ":");

        if self.category.is_none()
            && let Some(rest) = after_marker(&line, CATEGORY_MARKERS)
        {
            self.category = first_token(
                rest,
                &[("task", Category::Task), ("notification", Category::Notification)],
            );
        }

        if self.urgency.is_none()
            && let Some(rest) = after_marker(&line, URGENCY_MARKERS)
        {
            self.urgency = first_token(
                rest,
                &[
                    ("not urgent", Urgency::Normal),
                    ("urgent", Urgency::Urgent),
                    ("normal", Urgency::Normal),
                    ("不紧急", Urgency::Normal),
                    ("紧急", Urgency::Urgent),
                    ("普通", Urgency::Normal),
                ],
            );
        }
    }

    pub fn is_complete(&self) -> bool {
        self.category.is_some() && self.urgency.is_some()
    }

    pub fn finish(self) -> Classification {
        Classification {
            category: self.category.unwrap_or_default(),
            urgency: self.urgency.unwrap_or_default(),
        }
    }
}

pub fn parse_labels(response: &str) -> Classification {
    let mut scanner = LabelScanner::default();
    for line in response.lines() {
        scanner.feed_line(line);
        if scanner.is_complete() {
            break;
        }
    }
    scanner.finish()
}

fn after_marker<'a>(line: &'a str, markers: &[&str]) -> Option<&'a str> {
    markers
        .iter()
        .filter_map(|m| line.find(m).map(|i| &line[i + m.len()..]))
        .next()
}

/// Earliest occurrence wins; on equal positions the longer (earlier listed) token wins.
fn first_token<T: Copy>(text: &str, tokens: &[(&str, T)]) -> Option<T> {
    tokens
        .iter()
        .filter_map(|(tok, v)| text.find(tok).map(|pos| (pos, *v)))
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, v)| v)
}
