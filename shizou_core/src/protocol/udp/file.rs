//! FILE request and its pipe-delimited result

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::codec::decode_value;
use super::session::{UdpRequest, UdpResponse};
use crate::error::{ProtocolError, ValidationError};
use crate::protocol::{Outcome, codes};

/// File fields selectable through `fmask`, with their bit positions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileField {
    AnimeId = 38,
    EpisodeId = 37,
    GroupId = 36,
    MyListId = 35,
    OtherEpisodes = 34,
    IsDeprecated = 33,
    State = 32,
    Size = 31,
    Ed2k = 30,
    Md5 = 29,
    Sha1 = 28,
    Crc32 = 27,
    VideoColorDepth = 25,
    Quality = 23,
    Source = 22,
    AudioCodecs = 21,
    AudioBitrates = 20,
    VideoCodec = 19,
    VideoBitrate = 18,
    VideoResolution = 17,
    FileExtension = 16,
    DubLanguages = 15,
    SubLanguages = 14,
    LengthInSeconds = 13,
    Description = 12,
    AiredDate = 11,
    AniDbFileName = 8,
    MyListState = 7,
    MyListFileState = 6,
    MyListViewed = 5,
    MyListViewDate = 4,
    MyListStorage = 3,
    MyListSource = 2,
    MyListOther = 1,
}

impl FileField {
    /// Every field, highest bit first
    pub const ALL: [FileField; 34] = [
        Self::AnimeId,
        Self::EpisodeId,
        Self::GroupId,
        Self::MyListId,
        Self::OtherEpisodes,
        Self::IsDeprecated,
        Self::State,
        Self::Size,
        Self::Ed2k,
        Self::Md5,
        Self::Sha1,
        Self::Crc32,
        Self::VideoColorDepth,
        Self::Quality,
        Self::Source,
        Self::AudioCodecs,
        Self::AudioBitrates,
        Self::VideoCodec,
        Self::VideoBitrate,
        Self::VideoResolution,
        Self::FileExtension,
        Self::DubLanguages,
        Self::SubLanguages,
        Self::LengthInSeconds,
        Self::Description,
        Self::AiredDate,
        Self::AniDbFileName,
        Self::MyListState,
        Self::MyListFileState,
        Self::MyListViewed,
        Self::MyListViewDate,
        Self::MyListStorage,
        Self::MyListSource,
        Self::MyListOther,
    ];

    pub fn bit(self) -> u64 {
        1u64 << (self as u8)
    }
}

/// Anime, episode and group fields selectable through `amask`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnimeField {
    TotalEpisodes = 31,
    HighestEpisodeNumber = 30,
    Year = 29,
    Type = 28,
    RelatedAnimeIds = 27,
    RelatedAnimeTypes = 26,
    Categories = 25,
    TitleRomaji = 23,
    TitleKanji = 22,
    TitleEnglish = 21,
    TitlesOther = 20,
    TitlesShort = 19,
    TitlesSynonym = 18,
    EpisodeNumber = 15,
    EpisodeTitleEnglish = 14,
    EpisodeTitleRomaji = 13,
    EpisodeTitleKanji = 12,
    EpisodeRating = 11,
    EpisodeVoteCount = 10,
    GroupName = 7,
    GroupNameShort = 6,
    DateRecordUpdated = 0,
}

impl AnimeField {
    /// Every field, highest bit first
    pub const ALL: [AnimeField; 22] = [
        Self::TotalEpisodes,
        Self::HighestEpisodeNumber,
        Self::Year,
        Self::Type,
        Self::RelatedAnimeIds,
        Self::RelatedAnimeTypes,
        Self::Categories,
        Self::TitleRomaji,
        Self::TitleKanji,
        Self::TitleEnglish,
        Self::TitlesOther,
        Self::TitlesShort,
        Self::TitlesSynonym,
        Self::EpisodeNumber,
        Self::EpisodeTitleEnglish,
        Self::EpisodeTitleRomaji,
        Self::EpisodeTitleKanji,
        Self::EpisodeRating,
        Self::EpisodeVoteCount,
        Self::GroupName,
        Self::GroupNameShort,
        Self::DateRecordUpdated,
    ];

    pub fn bit(self) -> u32 {
        1u32 << (self as u8)
    }
}

/// File mask, sent as 10 upper-case hex digits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FMask(pub u64);

impl FMask {
    pub fn from_fields(fields: &[FileField]) -> Self {
        Self(fields.iter().fold(0, |mask, field| mask | field.bit()))
    }

    pub fn contains(self, field: FileField) -> bool {
        self.0 & field.bit() != 0
    }

    /// Selected fields in response order
    pub fn fields(self) -> impl Iterator<Item = FileField> {
        FileField::ALL.into_iter().filter(move |field| self.contains(*field))
    }

    pub fn to_hex(self) -> String {
        format!("{:010X}", self.0)
    }
}

impl Default for FMask {
    fn default() -> Self {
        Self::from_fields(&[
            FileField::AnimeId,
            FileField::EpisodeId,
            FileField::GroupId,
            FileField::MyListId,
            FileField::OtherEpisodes,
            FileField::IsDeprecated,
            FileField::State,
            FileField::Size,
            FileField::Ed2k,
            FileField::Crc32,
            FileField::Quality,
            FileField::Source,
            FileField::VideoCodec,
            FileField::VideoResolution,
            FileField::FileExtension,
            FileField::DubLanguages,
            FileField::SubLanguages,
            FileField::LengthInSeconds,
            FileField::AiredDate,
            FileField::AniDbFileName,
            FileField::MyListState,
            FileField::MyListFileState,
            FileField::MyListViewed,
            FileField::MyListViewDate,
        ])
    }
}

/// Anime mask, sent as 8 upper-case hex digits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AMask(pub u32);

impl AMask {
    pub fn from_fields(fields: &[AnimeField]) -> Self {
        Self(fields.iter().fold(0, |mask, field| mask | field.bit()))
    }

    pub fn contains(self, field: AnimeField) -> bool {
        self.0 & field.bit() != 0
    }

    /// Selected fields in response order
    pub fn fields(self) -> impl Iterator<Item = AnimeField> {
        AnimeField::ALL
            .into_iter()
            .filter(move |field| self.contains(*field))
    }

    pub fn to_hex(self) -> String {
        format!("{:08X}", self.0)
    }
}

impl Default for AMask {
    fn default() -> Self {
        Self::from_fields(&[
            AnimeField::TotalEpisodes,
            AnimeField::Year,
            AnimeField::Type,
            AnimeField::TitleRomaji,
            AnimeField::TitleEnglish,
            AnimeField::EpisodeNumber,
            AnimeField::EpisodeTitleEnglish,
            AnimeField::GroupName,
            AnimeField::GroupNameShort,
        ])
    }
}

/// Parsed `220 FILE` response
///
/// Fields not selected by the masks, left empty by the server, or carrying a
/// `none`/`0` sentinel are `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileResult {
    pub fid: u64,
    pub anime_id: Option<u64>,
    pub episode_id: Option<u64>,
    pub group_id: Option<u64>,
    pub mylist_id: Option<u64>,
    /// Other episodes the file covers, with the percentage of each
    pub other_episodes: Option<Vec<(u64, f32)>>,
    pub is_deprecated: Option<bool>,
    pub state: Option<u16>,
    pub size: Option<u64>,
    pub ed2k: Option<String>,
    pub md5: Option<String>,
    pub sha1: Option<String>,
    pub crc32: Option<String>,
    pub video_color_depth: Option<u32>,
    pub quality: Option<String>,
    pub source: Option<String>,
    pub audio_codecs: Option<Vec<String>>,
    pub audio_bitrates: Option<Vec<u32>>,
    pub video_codec: Option<String>,
    pub video_bitrate: Option<u32>,
    pub video_resolution: Option<String>,
    pub file_extension: Option<String>,
    pub dub_languages: Option<Vec<String>>,
    pub sub_languages: Option<Vec<String>>,
    pub length_seconds: Option<u32>,
    pub description: Option<String>,
    pub aired_date: Option<DateTime<Utc>>,
    pub anidb_file_name: Option<String>,
    pub mylist_state: Option<u8>,
    pub mylist_file_state: Option<u8>,
    pub mylist_viewed: Option<bool>,
    pub mylist_view_date: Option<DateTime<Utc>>,
    pub mylist_storage: Option<String>,
    pub mylist_source: Option<String>,
    pub mylist_other: Option<String>,

    pub total_episodes: Option<u32>,
    pub highest_episode_number: Option<u32>,
    pub year: Option<String>,
    pub anime_type: Option<String>,
    pub related_anime_ids: Option<Vec<u64>>,
    pub related_anime_types: Option<Vec<String>>,
    pub categories: Option<Vec<String>>,
    pub title_romaji: Option<String>,
    pub title_kanji: Option<String>,
    pub title_english: Option<String>,
    pub titles_other: Option<Vec<String>>,
    pub titles_short: Option<Vec<String>>,
    pub titles_synonym: Option<Vec<String>>,
    pub episode_number: Option<String>,
    pub episode_title_english: Option<String>,
    pub episode_title_romaji: Option<String>,
    pub episode_title_kanji: Option<String>,
    pub episode_rating: Option<u32>,
    pub episode_vote_count: Option<u32>,
    pub group_name: Option<String>,
    pub group_name_short: Option<String>,
    pub date_record_updated: Option<DateTime<Utc>>,
}

fn number<T: std::str::FromStr>(field: &str, data: &str) -> Result<T, ProtocolError> {
    data.parse()
        .map_err(|_| ProtocolError::malformed(format!("FILE field {field} is not a number: {data}")))
}

/// Number where `0` means absent
fn nonzero<T: std::str::FromStr + PartialEq + Default>(
    field: &str,
    data: &str,
) -> Result<Option<T>, ProtocolError> {
    let value: T = number(field, data)?;
    Ok((value != T::default()).then_some(value))
}

/// String where `none` means absent
fn text(data: &str) -> Option<String> {
    (data != "none").then(|| decode_value(data))
}

fn list(data: &str) -> Vec<String> {
    data.split('\'')
        .filter(|item| *item != "none")
        .map(decode_value)
        .collect()
}

fn number_list<T: std::str::FromStr>(field: &str, data: &str) -> Result<Vec<T>, ProtocolError> {
    data.split('\'')
        .filter(|item| *item != "none")
        .map(|item| number(field, item))
        .collect()
}

fn timestamp(field: &str, data: &str) -> Result<Option<DateTime<Utc>>, ProtocolError> {
    match nonzero::<i64>(field, data)? {
        Some(secs) => DateTime::from_timestamp(secs, 0)
            .map(Some)
            .ok_or_else(|| ProtocolError::malformed(format!("FILE field {field} out of range"))),
        None => Ok(None),
    }
}

impl FileResult {
    /// Parse a `220` body produced with the given masks
    pub fn parse(body: &str, fmask: FMask, amask: AMask) -> Result<Self, ProtocolError> {
        let line = body.lines().next().unwrap_or_default().trim_end();
        let mut values = line.split('|');
        let mut next = |field: &str| {
            values.next().ok_or_else(|| {
                ProtocolError::malformed(format!("FILE response ended before field {field}"))
            })
        };

        let mut result = FileResult {
            fid: number("fid", next("fid")?)?,
            ..Default::default()
        };

        for field in fmask.fields() {
            let name = format!("{field:?}");
            let data = next(&name)?;
            if data.trim().is_empty() {
                continue;
            }
            result.apply_file_field(field, &name, data)?;
        }
        for field in amask.fields() {
            let name = format!("{field:?}");
            let data = next(&name)?;
            if data.trim().is_empty() {
                continue;
            }
            result.apply_anime_field(field, &name, data)?;
        }
        Ok(result)
    }

    fn apply_file_field(
        &mut self,
        field: FileField,
        name: &str,
        data: &str,
    ) -> Result<(), ProtocolError> {
        match field {
            FileField::AnimeId => self.anime_id = Some(number(name, data)?),
            FileField::EpisodeId => self.episode_id = Some(number(name, data)?),
            FileField::GroupId => self.group_id = nonzero(name, data)?,
            FileField::MyListId => self.mylist_id = nonzero(name, data)?,
            FileField::OtherEpisodes => {
                let episodes = data
                    .split('\'')
                    .map(|episode| {
                        let (eid, percent) = episode.split_once(',').ok_or_else(|| {
                            ProtocolError::malformed(format!("Bad other episode entry: {episode}"))
                        })?;
                        let eid: u64 = number(name, eid)?;
                        let percent: f32 = number(name, percent)?;
                        Ok((eid, percent / 100.0))
                    })
                    .collect::<Result<Vec<_>, ProtocolError>>()?;
                self.other_episodes = Some(episodes);
            }
            FileField::IsDeprecated => self.is_deprecated = Some(number::<u8>(name, data)? != 0),
            FileField::State => self.state = Some(number(name, data)?),
            FileField::Size => self.size = Some(number(name, data)?),
            FileField::Ed2k => self.ed2k = Some(data.to_string()),
            FileField::Md5 => self.md5 = Some(data.to_string()),
            FileField::Sha1 => self.sha1 = Some(data.to_string()),
            FileField::Crc32 => self.crc32 = Some(data.to_string()),
            FileField::VideoColorDepth => self.video_color_depth = nonzero(name, data)?,
            FileField::Quality => self.quality = text(data),
            FileField::Source => self.source = text(data),
            FileField::AudioCodecs => self.audio_codecs = Some(list(data)),
            FileField::AudioBitrates => self.audio_bitrates = Some(number_list(name, data)?),
            FileField::VideoCodec => self.video_codec = text(data),
            FileField::VideoBitrate => {
                self.video_bitrate = match data {
                    "none" => None,
                    _ => Some(number(name, data)?),
                }
            }
            FileField::VideoResolution => self.video_resolution = text(data),
            FileField::FileExtension => self.file_extension = text(data),
            FileField::DubLanguages => self.dub_languages = Some(list(data)),
            FileField::SubLanguages => self.sub_languages = Some(list(data)),
            FileField::LengthInSeconds => self.length_seconds = nonzero(name, data)?,
            FileField::Description => self.description = Some(decode_value(data)),
            FileField::AiredDate => self.aired_date = timestamp(name, data)?,
            FileField::AniDbFileName => self.anidb_file_name = Some(decode_value(data)),
            FileField::MyListState => self.mylist_state = Some(number(name, data)?),
            FileField::MyListFileState => self.mylist_file_state = Some(number(name, data)?),
            FileField::MyListViewed => self.mylist_viewed = Some(number::<u8>(name, data)? != 0),
            FileField::MyListViewDate => self.mylist_view_date = timestamp(name, data)?,
            FileField::MyListStorage => self.mylist_storage = Some(decode_value(data)),
            FileField::MyListSource => self.mylist_source = Some(decode_value(data)),
            FileField::MyListOther => self.mylist_other = Some(decode_value(data)),
        }
        Ok(())
    }

    fn apply_anime_field(
        &mut self,
        field: AnimeField,
        name: &str,
        data: &str,
    ) -> Result<(), ProtocolError> {
        match field {
            AnimeField::TotalEpisodes => self.total_episodes = Some(number(name, data)?),
            AnimeField::HighestEpisodeNumber => {
                self.highest_episode_number = Some(number(name, data)?)
            }
            AnimeField::Year => self.year = Some(data.to_string()),
            AnimeField::Type => self.anime_type = Some(data.to_string()),
            AnimeField::RelatedAnimeIds => self.related_anime_ids = Some(number_list(name, data)?),
            AnimeField::RelatedAnimeTypes => self.related_anime_types = Some(list(data)),
            AnimeField::Categories => {
                self.categories = Some(data.split(',').map(decode_value).collect())
            }
            AnimeField::TitleRomaji => self.title_romaji = Some(decode_value(data)),
            AnimeField::TitleKanji => self.title_kanji = Some(decode_value(data)),
            AnimeField::TitleEnglish => self.title_english = Some(decode_value(data)),
            AnimeField::TitlesOther => self.titles_other = Some(list(data)),
            AnimeField::TitlesShort => self.titles_short = Some(list(data)),
            AnimeField::TitlesSynonym => self.titles_synonym = Some(list(data)),
            AnimeField::EpisodeNumber => self.episode_number = Some(data.to_string()),
            AnimeField::EpisodeTitleEnglish => {
                self.episode_title_english = Some(decode_value(data))
            }
            AnimeField::EpisodeTitleRomaji => self.episode_title_romaji = Some(decode_value(data)),
            AnimeField::EpisodeTitleKanji => self.episode_title_kanji = Some(decode_value(data)),
            AnimeField::EpisodeRating => self.episode_rating = Some(number(name, data)?),
            AnimeField::EpisodeVoteCount => self.episode_vote_count = Some(number(name, data)?),
            AnimeField::GroupName => self.group_name = Some(decode_value(data)),
            AnimeField::GroupNameShort => self.group_name_short = Some(decode_value(data)),
            AnimeField::DateRecordUpdated => self.date_record_updated = timestamp(name, data)?,
        }
        Ok(())
    }
}

/// How the file is identified
#[derive(Debug, Clone, PartialEq, Eq)]
enum FileLookup {
    Id(u64),
    Hash { size: u64, ed2k: String },
    Episode { aid: u64, gid: u64, epno: String },
}

/// FILE request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRequest {
    lookup: FileLookup,
    fmask: FMask,
    amask: AMask,
}

impl FileRequest {
    pub fn by_id(fid: u64) -> Result<Self, ValidationError> {
        if fid == 0 {
            return Err(ValidationError::invalid_parameter("fid", "must be positive"));
        }
        Ok(Self::new(FileLookup::Id(fid)))
    }

    pub fn by_hash(size: u64, ed2k: &str) -> Result<Self, ValidationError> {
        if size == 0 {
            return Err(ValidationError::invalid_parameter("size", "must be positive"));
        }
        if ed2k.len() != 32 || !ed2k.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ValidationError::invalid_parameter(
                "ed2k",
                "must be 32 hex digits",
            ));
        }
        Ok(Self::new(FileLookup::Hash {
            size,
            ed2k: ed2k.to_ascii_lowercase(),
        }))
    }

    pub fn by_episode(aid: u64, gid: u64, epno: &str) -> Result<Self, ValidationError> {
        if aid == 0 {
            return Err(ValidationError::invalid_parameter("aid", "must be positive"));
        }
        if gid == 0 {
            return Err(ValidationError::invalid_parameter("gid", "must be positive"));
        }
        if epno.trim().is_empty() {
            return Err(ValidationError::invalid_parameter("epno", "must not be empty"));
        }
        Ok(Self::new(FileLookup::Episode {
            aid,
            gid,
            epno: epno.to_string(),
        }))
    }

    fn new(lookup: FileLookup) -> Self {
        Self {
            lookup,
            fmask: FMask::default(),
            amask: AMask::default(),
        }
    }

    pub fn with_masks(mut self, fmask: FMask, amask: AMask) -> Self {
        self.fmask = fmask;
        self.amask = amask;
        self
    }
}

impl UdpRequest for FileRequest {
    type Output = FileResult;

    fn command(&self) -> &'static str {
        "FILE"
    }

    fn params(&self) -> Vec<(String, String)> {
        let mut params = match &self.lookup {
            FileLookup::Id(fid) => vec![("fid".to_string(), fid.to_string())],
            FileLookup::Hash { size, ed2k } => vec![
                ("size".to_string(), size.to_string()),
                ("ed2k".to_string(), ed2k.clone()),
            ],
            FileLookup::Episode { aid, gid, epno } => vec![
                ("aid".to_string(), aid.to_string()),
                ("gid".to_string(), gid.to_string()),
                ("epno".to_string(), epno.clone()),
            ],
        };
        params.push(("fmask".to_string(), self.fmask.to_hex()));
        params.push(("amask".to_string(), self.amask.to_hex()));
        params
    }

    fn classify(&self, response: &UdpResponse) -> Outcome<FileResult> {
        match response.code {
            codes::FILE => match FileResult::parse(&response.body, self.fmask, self.amask) {
                Ok(result) => Outcome::Success(result),
                Err(e) => Outcome::Fatal(e.to_string()),
            },
            codes::MULTIPLE_FILES_FOUND => Outcome::Negative(format!(
                "Multiple files found: {}",
                response.body.trim().replace('|', ", ")
            )),
            codes::NO_SUCH_FILE => Outcome::Negative("No such file".to_string()),
            code => Outcome::Fatal(format!("Unexpected FILE response {code} {}", response.text)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(code: u16, body: &str) -> UdpResponse {
        UdpResponse {
            code,
            text: "FILE".to_string(),
            body: body.to_string(),
        }
    }

    #[test]
    fn test_mask_hex_width() {
        assert_eq!(FMask::from_fields(&[FileField::AnimeId]).to_hex(), "4000000000");
        assert_eq!(FMask(0).to_hex(), "0000000000");
        assert_eq!(AMask::from_fields(&[AnimeField::TotalEpisodes]).to_hex(), "80000000");
        assert_eq!(AMask::from_fields(&[AnimeField::DateRecordUpdated]).to_hex(), "00000001");
    }

    #[test]
    fn test_mask_fields_descending() {
        let mask = FMask::from_fields(&[FileField::Size, FileField::AnimeId, FileField::Ed2k]);
        let fields: Vec<_> = mask.fields().collect();
        assert_eq!(fields, vec![FileField::AnimeId, FileField::Size, FileField::Ed2k]);
    }

    #[test]
    fn test_params_by_id() {
        let request = FileRequest::by_id(312498).unwrap();
        let keys: Vec<String> = request.params().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["fid", "fmask", "amask"]);
    }

    #[test]
    fn test_params_by_hash_lowercases() {
        let request = FileRequest::by_hash(1024, "0123456789ABCDEF0123456789ABCDEF").unwrap();
        let params = request.params();
        assert_eq!(params[0], ("size".to_string(), "1024".to_string()));
        assert_eq!(
            params[1],
            ("ed2k".to_string(), "0123456789abcdef0123456789abcdef".to_string())
        );
    }

    #[test]
    fn test_validation_fails_before_io() {
        assert!(FileRequest::by_id(0).is_err());
        assert!(FileRequest::by_hash(0, "0123456789abcdef0123456789abcdef").is_err());
        assert!(FileRequest::by_hash(10, "").is_err());
        assert!(FileRequest::by_hash(10, "xyz").is_err());
        assert!(FileRequest::by_episode(1, 2, "").is_err());
        assert!(FileRequest::by_episode(1, 0, "3").is_err());
        assert!(FileRequest::by_episode(1, 2, "S1").is_ok());
    }

    #[test]
    fn test_parse_selected_fields() {
        let fmask = FMask::from_fields(&[
            FileField::AnimeId,
            FileField::EpisodeId,
            FileField::GroupId,
            FileField::MyListId,
            FileField::Size,
            FileField::Ed2k,
            FileField::VideoCodec,
            FileField::DubLanguages,
            FileField::LengthInSeconds,
        ]);
        let amask = AMask::from_fields(&[AnimeField::TitleRomaji, AnimeField::EpisodeNumber]);
        let body = "312498|22|4567|10|0|733810688|3ab0d2e1b6b5c6e4a8b0e3f9c1d2e3f4|none|japanese'english|0|Kino`s Tabi|01";

        let result = FileResult::parse(body, fmask, amask).unwrap();
        assert_eq!(result.fid, 312498);
        assert_eq!(result.anime_id, Some(22));
        assert_eq!(result.episode_id, Some(4567));
        assert_eq!(result.group_id, Some(10));
        assert_eq!(result.mylist_id, None);
        assert_eq!(result.size, Some(733810688));
        assert_eq!(result.video_codec, None);
        assert_eq!(
            result.dub_languages,
            Some(vec!["japanese".to_string(), "english".to_string()])
        );
        assert_eq!(result.length_seconds, None);
        assert_eq!(result.title_romaji.as_deref(), Some("Kino's Tabi"));
        assert_eq!(result.episode_number.as_deref(), Some("01"));
    }

    #[test]
    fn test_parse_skips_empty_fields() {
        let fmask = FMask::from_fields(&[FileField::AnimeId, FileField::Crc32, FileField::Quality]);
        let result = FileResult::parse("5|7||high", fmask, AMask(0)).unwrap();
        assert_eq!(result.anime_id, Some(7));
        assert_eq!(result.crc32, None);
        assert_eq!(result.quality.as_deref(), Some("high"));
    }

    #[test]
    fn test_parse_other_episodes() {
        let fmask = FMask::from_fields(&[FileField::OtherEpisodes]);
        let result = FileResult::parse("5|100,50'101,100", fmask, AMask(0)).unwrap();
        assert_eq!(result.other_episodes, Some(vec![(100, 0.5), (101, 1.0)]));
    }

    #[test]
    fn test_parse_truncated_is_error() {
        let fmask = FMask::from_fields(&[FileField::AnimeId, FileField::Size]);
        assert!(FileResult::parse("5|7", fmask, AMask(0)).is_err());
        assert!(FileResult::parse("abc", FMask(0), AMask(0)).is_err());
    }

    #[test]
    fn test_classify_codes() {
        let request = FileRequest::by_id(5)
            .unwrap()
            .with_masks(FMask::from_fields(&[FileField::AnimeId]), AMask(0));

        assert_eq!(
            request.classify(&response(220, "5|7")).success().map(|r| r.anime_id),
            Some(Some(7))
        );
        match request.classify(&response(322, "5|6|7")) {
            Outcome::Negative(reason) => assert!(reason.contains("5, 6, 7")),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            request.classify(&response(320, "")),
            Outcome::Negative(_)
        ));
        assert!(matches!(
            request.classify(&response(220, "garbage")),
            Outcome::Fatal(_)
        ));
    }
}
