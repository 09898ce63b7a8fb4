use serde::{Deserialize, Serialize};

// Fields are declared in alphabetical order so the serialized JSON keeps
// sorted keys.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FileRecord {
    pub check_path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lwt: Option<i64>,

    pub md5: String,
    pub name: String,

    #[serde(default)]
    pub packed: bool,

    pub url: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    pub files: Vec<FileRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub fast_path: usize,
    pub rehashed: usize,
    pub fetched: usize,
    pub excluded: usize,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.fast_path + self.rehashed + self.fetched
    }
}
