use records::Record;
use serde::Deserialize;

#[derive(Deserialize, Record)]
struct Body {
    id: i64,
    #[serde(rename = "title")]
    name: String,
    #[serde(rename(deserialize = "orbits_id"))]
    orbits: Option<i64>,
    #[serde(skip)]
    cached: bool,
}

fn main() {
    assert_eq!(Body::FIELDS, &["id", "title", "orbits_id"]);
}
