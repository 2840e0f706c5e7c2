use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::error::MongoDaoError;
use crate::{
    dao::models::{CompetitionEntity, GroupEntity, UserEntity},
    state::attempt::{Attempt, AttemptKey, PuzzleLevel, Step},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoAttemptDocument {
    #[serde(rename = "_id")]
    id: String,
    competition_id: String,
    user_id: String,
    puzzle_id: String,
    puzzle_index: i64,
    puzzle_lvl: PuzzleLevel,
    step: i32,
    start_time: DateTime,
    end_time: Option<DateTime>,
    attempts: i64,
    last_answer: Option<String>,
    last_move_time: Option<DateTime>,
    score: f64,
    #[serde(default)]
    version: i64,
}

impl From<Attempt> for MongoAttemptDocument {
    fn from(value: Attempt) -> Self {
        Self {
            id: value.id.to_string(),
            competition_id: value.key.competition_id,
            user_id: value.key.user_id,
            puzzle_id: value.key.puzzle_id,
            puzzle_index: i64::from(value.key.puzzle_index),
            puzzle_lvl: value.puzzle_lvl,
            step: i32::from(u8::from(value.key.step)),
            start_time: to_bson_time(value.start_time),
            end_time: value.end_time.map(to_bson_time),
            attempts: i64::from(value.attempts),
            last_answer: value.last_answer,
            last_move_time: value.last_move_time.map(to_bson_time),
            score: value.score,
            version: value.version as i64,
        }
    }
}

impl TryFrom<MongoAttemptDocument> for Attempt {
    type Error = MongoDaoError;

    fn try_from(doc: MongoAttemptDocument) -> Result<Self, Self::Error> {
        let malformed = |reason: &str| MongoDaoError::MalformedAttempt {
            id: doc.id.clone(),
            reason: reason.to_string(),
        };

        let id = Uuid::parse_str(&doc.id).map_err(|_| malformed("invalid UUID"))?;
        let step = u8::try_from(doc.step)
            .ok()
            .and_then(|raw| Step::try_from(raw).ok())
            .ok_or_else(|| malformed("invalid step"))?;
        let puzzle_index =
            u32::try_from(doc.puzzle_index).map_err(|_| malformed("invalid puzzle index"))?;
        let attempts = u32::try_from(doc.attempts).map_err(|_| malformed("invalid attempts"))?;
        let version = u64::try_from(doc.version).map_err(|_| malformed("invalid version"))?;
        let start_time =
            from_bson_time(doc.start_time).ok_or_else(|| malformed("invalid start time"))?;
        let end_time = doc
            .end_time
            .map(|value| from_bson_time(value).ok_or_else(|| malformed("invalid end time")))
            .transpose()?;
        let last_move_time = doc
            .last_move_time
            .map(|value| from_bson_time(value).ok_or_else(|| malformed("invalid last move time")))
            .transpose()?;

        Ok(Attempt {
            id,
            key: AttemptKey {
                competition_id: doc.competition_id,
                user_id: doc.user_id,
                puzzle_id: doc.puzzle_id,
                puzzle_index,
                step,
            },
            puzzle_lvl: doc.puzzle_lvl,
            start_time,
            end_time,
            attempts,
            last_answer: doc.last_answer,
            last_move_time,
            score: doc.score,
            version,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoCompetitionDocument {
    #[serde(rename = "_id")]
    id: String,
    title: String,
    catalog_address: String,
    catalog_theme: String,
}

impl From<MongoCompetitionDocument> for CompetitionEntity {
    fn from(value: MongoCompetitionDocument) -> Self {
        Self {
            id: value.id,
            title: value.title,
            catalog_address: value.catalog_address,
            catalog_theme: value.catalog_theme,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoUserDocument {
    #[serde(rename = "_id")]
    id: String,
    firstname: String,
    lastname: String,
    #[serde(default)]
    groups: Vec<GroupEntity>,
}

impl From<MongoUserDocument> for UserEntity {
    fn from(value: MongoUserDocument) -> Self {
        Self {
            id: value.id,
            firstname: value.firstname,
            lastname: value.lastname,
            groups: value.groups,
        }
    }
}

/// Filter matching exactly the row identified by `key`.
pub fn key_filter(key: &AttemptKey) -> Document {
    doc! {
        "competition_id": &key.competition_id,
        "user_id": &key.user_id,
        "puzzle_id": &key.puzzle_id,
        "puzzle_index": i64::from(key.puzzle_index),
        "step": i32::from(u8::from(key.step)),
    }
}

pub fn doc_id(id: &str) -> Document {
    doc! {"_id": id}
}

fn to_bson_time(value: OffsetDateTime) -> DateTime {
    DateTime::from_millis((value.unix_timestamp_nanos() / 1_000_000) as i64)
}

fn from_bson_time(value: DateTime) -> Option<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(value.timestamp_millis()) * 1_000_000)
        .ok()
}
