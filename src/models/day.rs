use serde::{Deserialize, Serialize};

/// Day of the week a session is scheduled on.
///
/// Sessions are addressed by the structured key `(trainer, day, time)` or by
/// their explicit id; day names are never embedded into parsed strings, so
/// nothing here constrains what characters a trainer name may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Day {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Day {
    pub fn as_str(&self) -> &'static str {
        match self {
            Day::Monday => "Monday",
            Day::Tuesday => "Tuesday",
            Day::Wednesday => "Wednesday",
            Day::Thursday => "Thursday",
            Day::Friday => "Friday",
            Day::Saturday => "Saturday",
            Day::Sunday => "Sunday",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Monday" => Some(Day::Monday),
            "Tuesday" => Some(Day::Tuesday),
            "Wednesday" => Some(Day::Wednesday),
            "Thursday" => Some(Day::Thursday),
            "Friday" => Some(Day::Friday),
            "Saturday" => Some(Day::Saturday),
            "Sunday" => Some(Day::Sunday),
            _ => None,
        }
    }
}
