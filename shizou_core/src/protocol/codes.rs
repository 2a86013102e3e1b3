//! AniDB UDP response codes

pub const LOGIN_ACCEPTED: u16 = 200;
pub const LOGIN_ACCEPTED_NEW_VERSION: u16 = 201;
pub const LOGGED_OUT: u16 = 203;
pub const MYLIST_ADDED: u16 = 210;
pub const MYLIST_DELETED: u16 = 211;
pub const FILE: u16 = 220;
pub const MYLIST: u16 = 221;
pub const ANIME: u16 = 230;
pub const EPISODE: u16 = 240;
pub const GROUP: u16 = 250;
pub const PONG: u16 = 300;
pub const FILE_IN_MYLIST: u16 = 310;
pub const MYLIST_EDITED: u16 = 311;
pub const MULTIPLE_MYLIST_ENTRIES: u16 = 312;
pub const NO_SUCH_FILE: u16 = 320;
pub const NO_SUCH_ENTRY: u16 = 321;
pub const MULTIPLE_FILES_FOUND: u16 = 322;
pub const NO_SUCH_ANIME: u16 = 330;
pub const NO_SUCH_EPISODE: u16 = 340;
pub const NO_SUCH_GROUP: u16 = 350;
pub const NOT_LOGGED_IN: u16 = 403;
pub const NO_SUCH_MYLIST_ENTRY: u16 = 411;
pub const LOGIN_FAILED: u16 = 500;
pub const LOGIN_FIRST: u16 = 501;
pub const ACCESS_DENIED: u16 = 502;
pub const CLIENT_OUTDATED: u16 = 503;
pub const CLIENT_BANNED: u16 = 504;
pub const ILLEGAL_INPUT: u16 = 505;
pub const INVALID_SESSION: u16 = 506;
pub const BANNED: u16 = 555;
pub const UNKNOWN_COMMAND: u16 = 598;
pub const INTERNAL_SERVER_ERROR: u16 = 600;
pub const OUT_OF_SERVICE: u16 = 601;
pub const SERVER_BUSY: u16 = 602;
pub const TIMEOUT: u16 = 604;

/// Codes documented by the UDP API
const KNOWN: &[u16] = &[
    200, 201, 203, 209, 210, 211, 217, 218, 219, 220, 221, 222, 225, 230, 233, 235, 240, 243, 245,
    250, 260, 261, 262, 263, 297, 300, 309, 310, 311, 312, 317, 318, 319, 320, 321, 322, 325, 330,
    333, 335, 340, 343, 345, 350, 360, 361, 362, 363, 364, 394, 397, 403, 411, 500, 501, 502, 503,
    504, 505, 506, 509, 519, 555, 598, 600, 601, 602, 604,
];

/// Whether the code appears in the published code table
pub fn is_known(code: u16) -> bool {
    KNOWN.contains(&code)
}
