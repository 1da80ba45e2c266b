use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::ledger::TimelineLedger;
use crate::model::{AccountId, Activity, ActivityContent, ContentKind, EntryId};

/// Presentation-ready fields of one activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedActivity {
    pub headline: String,
    pub link: Option<String>,
    pub body: Option<String>,
    pub thumbnail: Option<String>,
    pub image: Option<String>,
}

pub trait Render {
    fn render(&self) -> RenderedActivity;
}

impl Render for Activity {
    fn render(&self) -> RenderedActivity {
        let headline = self
            .title
            .clone()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| self.link.clone())
            .unwrap_or_default();
        let mut rendered = RenderedActivity {
            headline,
            link: self.link.clone(),
            body: None,
            thumbnail: None,
            image: None,
        };

        match &self.content {
            ActivityContent::TwitterStatus { .. } => {}
            ActivityContent::DeliciousLink { description, .. } => {
                if !description.trim().is_empty() {
                    rendered.body = Some(description.clone());
                }
            }
            ActivityContent::FlickrPhoto {
                square_thumb_link,
                image_500px_link,
                ..
            } => {
                rendered.thumbnail = square_thumb_link.clone();
                rendered.image = image_500px_link.clone();
            }
        }
        rendered
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EntryView {
    pub id: EntryId,
    pub account_id: AccountId,
    pub content_kind: ContentKind,
    pub span_start: DateTime<Utc>,
    pub span_end: DateTime<Utc>,
    pub members: Vec<Activity>,
}

impl EntryView {
    pub fn rendered(&self) -> Vec<RenderedActivity> {
        self.members.iter().map(Render::render).collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct TimelineQuery {
    pub account: Option<AccountId>,
    pub limit: Option<usize>,
}

/// Entries newest first by `span_start`, members oldest first by `published`.
pub fn project(ledger: &TimelineLedger, query: &TimelineQuery) -> Vec<EntryView> {
    let mut entries: Vec<_> = ledger
        .entries()
        .filter(|e| query.account.as_ref().map_or(true, |a| &e.account_id == a))
        .collect();
    entries.sort_by(|a, b| b.span_start.cmp(&a.span_start).then(b.id.cmp(&a.id)));

    let limit = query.limit.unwrap_or(usize::MAX);
    entries
        .into_iter()
        .take(limit)
        .map(|entry| {
            let mut members: Vec<Activity> = ledger.members(entry.id).cloned().collect();
            members.sort_by(|a, b| a.published.cmp(&b.published).then(a.id.cmp(&b.id)));
            EntryView {
                id: entry.id,
                account_id: entry.account_id.clone(),
                content_kind: entry.content_kind,
                span_start: entry.span_start,
                span_end: entry.span_end,
                members,
            }
        })
        .collect()
}
