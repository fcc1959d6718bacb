use std::fmt::{Display, Formatter};

use crate::time::{time_format, unix_to_time};

/// Number of directory slots an index file carries. Record type codes
/// double as slot numbers, so every code is below this bound.
pub const MAX_RECORD_TYPES: usize = 12;

/// RecordTime is the split unix timestamp attached to most records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordTime {
    pub seconds: i64,
    pub nanoseconds: i32,
}

impl RecordTime {
    pub fn new(seconds: i64, nanoseconds: i32) -> Self {
        Self {
            seconds,
            nanoseconds,
        }
    }
}

impl Display for RecordTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            time_format(unix_to_time(self.seconds, self.nanoseconds))
        )
    }
}

/// RecordType identifies one record kind. The numeric code is also the
/// slot the type occupies in an index directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    /// Reserved index slot for ping scale factor entries; never written
    /// to a log file.
    ScaleFactors,
    FileHeader,
    Ping,
    VelocityProfile,
    Parameters,
    Comment,
    History,
    NavigationError,
    Summary,
    Attitude,
}

impl RecordType {
    pub const fn code(&self) -> u32 {
        match self {
            RecordType::ScaleFactors => 0,
            RecordType::FileHeader => 1,
            RecordType::Ping => 2,
            RecordType::VelocityProfile => 3,
            RecordType::Parameters => 4,
            RecordType::Comment => 5,
            RecordType::History => 6,
            RecordType::NavigationError => 7,
            RecordType::Summary => 8,
            RecordType::Attitude => 9,
        }
    }

    pub fn from_code(code: u32) -> Option<RecordType> {
        match code {
            0 => Some(RecordType::ScaleFactors),
            1 => Some(RecordType::FileHeader),
            2 => Some(RecordType::Ping),
            3 => Some(RecordType::VelocityProfile),
            4 => Some(RecordType::Parameters),
            5 => Some(RecordType::Comment),
            6 => Some(RecordType::History),
            7 => Some(RecordType::NavigationError),
            8 => Some(RecordType::Summary),
            9 => Some(RecordType::Attitude),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RecordType::ScaleFactors => "scale_factors",
            RecordType::FileHeader => "file_header",
            RecordType::Ping => "ping",
            RecordType::VelocityProfile => "velocity_profile",
            RecordType::Parameters => "parameters",
            RecordType::Comment => "comment",
            RecordType::History => "history",
            RecordType::NavigationError => "navigation_error",
            RecordType::Summary => "summary",
            RecordType::Attitude => "attitude",
        }
    }
}

/// ScaleFactor rescales one compressed beam subrecord of every ping that
/// follows it, until a later ping replaces the set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleFactor {
    pub subrecord_id: u32,
    pub multiplier: f64,
    pub offset: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileHeaderRecord {
    pub version: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PingRecord {
    pub time: RecordTime,
    pub latitude: f64,
    pub longitude: f64,
    pub heading: f64,
    /// Empty unless this ping embeds a fresh set of scale factors.
    pub scale_factors: Vec<ScaleFactor>,
    pub depths: Vec<f64>,
}

impl PingRecord {
    pub fn has_scale_factors(&self) -> bool {
        !self.scale_factors.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoundSpeedPoint {
    pub depth: f64,
    pub sound_speed: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VelocityProfileRecord {
    pub observation_time: RecordTime,
    pub application_time: RecordTime,
    pub points: Vec<SoundSpeedPoint>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterRecord {
    pub time: RecordTime,
    pub entries: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommentRecord {
    pub time: RecordTime,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRecord {
    pub time: RecordTime,
    pub host: String,
    pub operator: String,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NavigationErrorRecord {
    pub time: RecordTime,
    pub record_id: i32,
    pub latitude_error: f64,
    pub longitude_error: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRecord {
    pub start_time: RecordTime,
    pub end_time: RecordTime,
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub min_longitude: f64,
    pub max_longitude: f64,
    pub min_depth: f64,
    pub max_depth: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttitudeSample {
    pub offset_ms: u32,
    pub pitch: f64,
    pub roll: f64,
    pub heave: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttitudeRecord {
    pub base_time: RecordTime,
    pub samples: Vec<AttitudeSample>,
}

/// Record is one decoded unit of a log file.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    FileHeader(FileHeaderRecord),
    Ping(PingRecord),
    VelocityProfile(VelocityProfileRecord),
    Parameters(ParameterRecord),
    Comment(CommentRecord),
    History(HistoryRecord),
    NavigationError(NavigationErrorRecord),
    Summary(SummaryRecord),
    Attitude(AttitudeRecord),
}

impl Record {
    pub fn record_type(&self) -> RecordType {
        match self {
            Record::FileHeader(_) => RecordType::FileHeader,
            Record::Ping(_) => RecordType::Ping,
            Record::VelocityProfile(_) => RecordType::VelocityProfile,
            Record::Parameters(_) => RecordType::Parameters,
            Record::Comment(_) => RecordType::Comment,
            Record::History(_) => RecordType::History,
            Record::NavigationError(_) => RecordType::NavigationError,
            Record::Summary(_) => RecordType::Summary,
            Record::Attitude(_) => RecordType::Attitude,
        }
    }

    /// record_time is the record's own primary timestamp, for display and
    /// filtering. The file header carries none.
    pub fn record_time(&self) -> Option<RecordTime> {
        match self {
            Record::FileHeader(_) => None,
            Record::Ping(r) => Some(r.time),
            Record::VelocityProfile(r) => Some(r.observation_time),
            Record::Parameters(r) => Some(r.time),
            Record::Comment(r) => Some(r.time),
            Record::History(r) => Some(r.time),
            Record::NavigationError(r) => Some(r.time),
            Record::Summary(r) => Some(r.start_time),
            Record::Attitude(r) => Some(r.base_time),
        }
    }
}
