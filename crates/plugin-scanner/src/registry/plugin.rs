//! 레지스트리 응답 타입 -- 페이지 정보와 플러그인 레코드

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// `last_updated` 형식 (`2023-05-01 3:04pm GMT`에서 시간대를 뗀 부분)
const LAST_UPDATED_FORMAT: &str = "%Y-%m-%d %I:%M%p";

/// 레지스트리 한 페이지
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryPage {
    /// 페이지네이션 정보
    pub info: RegistryInfo,
    /// 이 페이지의 플러그인
    #[serde(default)]
    pub plugins: Vec<PluginRecord>,
}

/// 레지스트리 페이지네이션 정보
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryInfo {
    /// 현재 페이지 번호
    #[serde(default)]
    pub page: u32,
    /// 전체 페이지 수
    #[serde(default)]
    pub pages: u32,
    /// 전체 플러그인 수
    #[serde(default)]
    pub results: u64,
}

/// 별점 분포
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ratings {
    #[serde(rename = "1", default)]
    pub one: u64,
    #[serde(rename = "2", default)]
    pub two: u64,
    #[serde(rename = "3", default)]
    pub three: u64,
    #[serde(rename = "4", default)]
    pub four: u64,
    #[serde(rename = "5", default)]
    pub five: u64,
}

/// 아이콘 URL
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Icons {
    #[serde(rename = "1x", default)]
    pub one_x: String,
    #[serde(rename = "2x", default)]
    pub two_x: String,
}

/// 레지스트리의 플러그인 하나
///
/// 파싱 후에는 변경되지 않습니다. 파생 값(업데이트 후 경과일, 로컬 파일명)은
/// 필요할 때 계산합니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginRecord {
    pub name: String,
    pub slug: String,
    pub version: String,
    pub author: String,
    #[serde(deserialize_with = "object_or_default")]
    pub ratings: Ratings,
    pub num_ratings: u64,
    pub support_threads: u64,
    pub support_threads_resolved: u64,
    pub active_installs: u64,
    pub downloaded: u64,
    pub last_updated: String,
    pub added: String,
    pub homepage: String,
    pub description: String,
    pub short_description: String,
    pub download_link: String,
    pub donate_link: String,
    #[serde(deserialize_with = "object_or_default")]
    pub icons: Icons,
}

impl PluginRecord {
    /// `last_updated`를 UTC 시각으로 파싱합니다.
    ///
    /// 시간대 약어는 무시하고 UTC로 취급합니다.
    pub fn last_updated_at(&self) -> Option<DateTime<Utc>> {
        let stamp = self.last_updated.trim();
        let without_zone = match stamp.rsplit_once(' ') {
            Some((head, zone)) if zone.chars().all(|c| c.is_ascii_alphabetic()) => head,
            _ => stamp,
        };
        NaiveDateTime::parse_from_str(without_zone, LAST_UPDATED_FORMAT)
            .ok()
            .map(|naive| naive.and_utc())
    }

    /// 마지막 업데이트 이후 경과일 (소수점 버림)
    pub fn days_since_update(&self, now: DateTime<Utc>) -> Option<i64> {
        self.last_updated_at()
            .map(|updated| now.signed_duration_since(updated).num_days())
    }

    /// 다운로드 URL의 마지막 경로 세그먼트 (쿼리/프래그먼트 제외)
    pub fn download_basename(&self) -> Option<&str> {
        let link = self.download_link.split(['?', '#']).next().unwrap_or_default();
        let path = link.split_once("://").map_or(link, |(_, rest)| rest);
        let (_, path) = path.split_once('/')?;
        path.rsplit('/').find(|segment| !segment.is_empty())
    }

    /// 로컬 파일명: `<active_installs>_<days_since_update>_<basename>`
    ///
    /// 경과일을 계산할 수 없으면 해당 자리는 비워 둡니다.
    /// 다운로드 URL에 파일명이 없으면 `None`을 반환합니다.
    pub fn file_name(&self, now: DateTime<Utc>) -> Option<String> {
        let basename = self.download_basename()?;
        let days = self
            .days_since_update(now)
            .map(|d| d.to_string())
            .unwrap_or_default();
        Some(format!("{}_{}_{}", self.active_installs, days, basename))
    }

    /// 로그/표시용 이름 (이름이 비어 있으면 slug)
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.slug
        } else {
            &self.name
        }
    }
}

/// 레지스트리는 값이 없을 때 객체 대신 빈 배열(`[]`)을 보냅니다.
fn object_or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + serde::de::DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}
