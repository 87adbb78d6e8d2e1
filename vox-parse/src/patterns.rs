//! Pattern library: every regex and keyword list the command parser uses.
//!
//! Compiled once per parser. All patterns are case-insensitive so callers can
//! match against the original-case transcript and still slice out messages
//! with their capitalization intact.

use anyhow::Result;
use regex::Regex;
use vox_core::PlaceCategory;

pub const WEEKDAYS: [&str; 7] = [
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

/// Named places resolved against the user's saved places.
pub const NAMED_PLACES: &[&str] = &["home", "work", "office", "school", "university", "campus"];

/// Generic categories; resolved to nearby places at registration time.
pub const CATEGORY_KEYWORDS: &[(PlaceCategory, &[&str])] = &[
    (PlaceCategory::Grocery, &["grocery store", "grocery", "supermarket", "market"]),
    (PlaceCategory::Pharmacy, &["pharmacy", "drugstore", "drug store", "chemist"]),
    (PlaceCategory::GasStation, &["gas station", "petrol station", "fuel station"]),
    (PlaceCategory::Bank, &["bank", "atm"]),
    (PlaceCategory::Cafe, &["coffee shop", "cafe", "café"]),
    (PlaceCategory::Restaurant, &["restaurant"]),
    (PlaceCategory::Gym, &["gym", "fitness center"]),
    (PlaceCategory::Hospital, &["hospital", "clinic"]),
    (PlaceCategory::Library, &["library"]),
    (PlaceCategory::PostOffice, &["post office"]),
    (PlaceCategory::Store, &["store", "shop", "mall"]),
];

const WEEKDAY_ALT: &str = "monday|tuesday|wednesday|thursday|friday|saturday|sunday";

/// Words that introduce a place ("at the gym", "get to work", "leave home").
const PLACE_PREP: &str = r"at|near|from|reach|reaching|arrive\s+at|arriving\s+at|arrive|arriving|get\s+to|getting\s+to|get|leave|leaving|left|exit|exiting|pass|passing";

const PLACE_ARTICLE: &str = r"(?:the\s+|my\s+|a\s+|an\s+|any\s+)?";

const COORDS: &str = r"-?\d{1,2}\.\d{2,}\s*,\s*-?\d{1,3}\.\d{2,}";

/// A loose time token used inside the recurring-command shapes.
const TIME_TOKEN: &str = r"\d{1,2}(?::\d{2})?\s*(?:[ap]\.?\s?m\.?)?";

const PERIOD: &str = r"every\s+(?:single\s+)?(?:day|weekday|weekend|morning|evening|night|monday|tuesday|wednesday|thursday|friday|saturday|sunday)s?|each\s+day|daily|on\s+weekdays|on\s+weekends|weekdays|weekends";

const ALARM_LEAD: &str = r"set\s+(?:an?\s+|my\s+)?(?:recurring\s+|repeating\s+|daily\s+)?alarm|wake\s+me\s+up|alarm";

pub struct PatternLibrary {
    // time
    pub time_12h: Regex,
    pub time_24h: Regex,
    pub time_relative: Regex,
    pub weekday: Regex,
    pub tomorrow: Regex,
    pub today: Regex,

    // reminders / alarms
    pub remind_keyword: Regex,
    pub message: Regex,
    pub alarm_keyword: Regex,

    // snooze
    pub snooze: Regex,
    pub duration: Regex,

    // tasks
    pub add_task: Vec<Regex>,
    pub complete_task: Vec<Regex>,
    pub priority: Regex,
    pub due_weekday: Regex,
    pub due_relative: Regex,

    // recurring
    pub recurring_hint: Regex,
    pub recurring_period_first: Regex,
    pub recurring_message_first: Regex,
    pub recurring_time_first: Regex,

    // location
    pub place: Regex,
    pub coordinates: Regex,
    pub enter_trigger: Regex,
    pub exit_trigger: Regex,
    pub location_recurring: Regex,
    pub location_every_day: Regex,
    pub location_weekdays: Regex,
    pub location_weekends: Regex,
    pub location_named_days: Regex,
    pub time_window: Regex,
    pub day_part: Regex,
    pub radius: Regex,
    /// Message strategies, tried in order.
    pub location_messages: [Regex; 4],
    pub trigger_start: Regex,
    pub location_msg_tail: Regex,
    pub trigger_clause: Regex,

    // finance
    pub amount: Regex,
    pub expense_keywords: Regex,
    pub income_keywords: Regex,
    pub finance_description: Regex,
}

impl PatternLibrary {
    pub fn new() -> Result<Self> {
        let place_alt = place_alternation();
        let place_or_coords = format!(r"(?:\b(?:{place_alt})\b|{COORDS})");

        Ok(Self {
            time_12h: Regex::new(r"(?i)\b(?:at\s+)?(\d{1,2})(?::(\d{2}))?\s*([ap])\.?\s?m\b\.?")?,
            time_24h: Regex::new(r"(?i)\b(?:at\s+)?(\d{1,2}):(\d{2})\b")?,
            time_relative: Regex::new(r"(?i)\bin\s+(\d+|an?|one)\s+(minute|min|hour|hr)s?\b")?,
            weekday: Regex::new(&format!(r"(?i)\b(?:on|next|this)\s+({WEEKDAY_ALT})\b"))?,
            tomorrow: Regex::new(r"(?i)\btomorrow\b")?,
            today: Regex::new(r"(?i)\b(?:today|tonight)\b")?,

            remind_keyword: Regex::new(r"(?i)\bremind(?:er)?\b")?,
            message: Regex::new(r"(?i)\bto\s+(.+)$")?,
            alarm_keyword: Regex::new(r"(?i)\b(?:alarm|wake\s+me(?:\s+up)?)\b")?,

            snooze: Regex::new(r"(?i)^\s*(?:please\s+)?(?:snooze|remind\s+me\s+(?:again|later))\b")?,
            duration: Regex::new(r"(?i)\b(\d+|an?|one)\s+(minute|min|hour|hr)s?\b")?,

            add_task: vec![
                Regex::new(r"(?i)^\s*(?:please\s+)?(?:add|create|make)\s+(?:a\s+)?(?:new\s+)?(?:task|to-?do)(?:\s*:\s*|\s+(?:to|called|named)\s+|\s+)(.+)$")?,
                Regex::new(r"(?i)^\s*(?:please\s+)?add\s+(.+?)\s+to\s+(?:my\s+)?(?:to-?do|task)s?(?:\s+list)?\s*[.!]?$")?,
                Regex::new(r"(?i)^\s*(?:new\s+)?(?:task|to-?do)\s*:\s*(.+)$")?,
            ],
            complete_task: vec![
                Regex::new(r"(?i)^\s*(?:please\s+)?(?:mark|set)\s+(?:the\s+)?(?:task\s+)?(.+?)\s+as\s+(?:done|complete|completed|finished)\s*[.!]?$")?,
                Regex::new(r"(?i)^\s*(?:please\s+)?(?:complete|finish|check\s+off|cross\s+off|i\s+(?:finished|completed|did))\s+(?:the\s+)?(?:task\s+)?(.+?)\s*[.!]?$")?,
                Regex::new(r"(?i)^\s*(?:i'?m\s+)?done\s+with\s+(?:the\s+)?(?:task\s+)?(.+?)\s*[.!]?$")?,
            ],
            priority: Regex::new(r"(?i)[\s,]+(?:with\s+)?(?:priority\s+)?(high|medium|low)(?:\s+priority)?\s*[.!]?$")?,
            due_weekday: Regex::new(&format!(r"(?i)\s*\b(?:by|due(?:\s+on)?|on|before)\s+(?:next\s+)?({WEEKDAY_ALT})\b"))?,
            due_relative: Regex::new(r"(?i)\s*\b(?:due\s+|by\s+)?(tomorrow|today|tonight)\b")?,

            recurring_hint: Regex::new(r"(?i)\b(?:every|daily|weekdays|weekends|each\s+day)\b")?,
            recurring_period_first: Regex::new(&format!(
                r"(?i)^\s*(?:please\s+)?(?P<lead>remind\s+me|{ALARM_LEAD})\s+(?P<period>{PERIOD})\s+at\s+(?P<time>{TIME_TOKEN})(?:\s+(?:to|for)\s+(?P<msg>.+?))?\s*[.!]?$"
            ))?,
            recurring_message_first: Regex::new(&format!(
                r"(?i)^\s*(?:please\s+)?(?P<lead>remind\s+me|{ALARM_LEAD})\s+(?:to\s+|for\s+)?(?P<msg>.+?)\s+(?P<period>{PERIOD})\s+at\s+(?P<time>{TIME_TOKEN})\s*[.!]?$"
            ))?,
            recurring_time_first: Regex::new(&format!(
                r"(?i)^\s*(?:please\s+)?(?P<lead>remind\s+me|{ALARM_LEAD})\s+(?:(?:to|for)\s+(?P<msg>.+?)\s+)?at\s+(?P<time>{TIME_TOKEN})\s+(?P<period>{PERIOD})\s*[.!]?$"
            ))?,

            place: Regex::new(&format!(
                r"(?i)\b(?P<prep>{PLACE_PREP})\s+{PLACE_ARTICLE}(?P<place>(?:{place_alt})\b|{COORDS})"
            ))?,
            coordinates: Regex::new(&format!(r"({COORDS})"))?,
            enter_trigger: Regex::new(
                r"(?i)\b(?:(?:when(?:ever)?|as\s+soon\s+as|once|every\s+time|each\s+time)\s+i\b|at|near|arrive|arriving|reach|reaching|get\s+to|get\s+home|pass|passing)\b",
            )?,
            exit_trigger: Regex::new(r"(?i)\b(?:leave|leaving|left|exit|exiting|depart|departing|get\s+out\s+of|head\s+out\s+of)\b")?,
            location_recurring: Regex::new(r"(?i)\b(?:every\s+time|each\s+time|whenever|always)\b")?,
            location_every_day: Regex::new(r"(?i)\b(?:every\s+day|daily)\b")?,
            location_weekdays: Regex::new(r"(?i)\b(?:on\s+weekdays|every\s+weekday|during\s+the\s+week)\b")?,
            location_weekends: Regex::new(r"(?i)\b(?:on\s+weekends|every\s+weekend|on\s+the\s+weekend)\b")?,
            location_named_days: Regex::new(&format!(r"(?i)\b(?:on|every)\s+((?:{WEEKDAY_ALT})s?(?:\s*(?:,|and|,\s*and)\s*(?:{WEEKDAY_ALT})s?)*)\b"))?,
            time_window: Regex::new(
                r"(?i)\bbetween\s+(\d{1,2})(?::\d{2})?\s*([ap])?\.?\s?m?\.?\s+and\s+(\d{1,2})(?::\d{2})?\s*([ap])?\.?\s?m?\b\.?",
            )?,
            day_part: Regex::new(r"(?i)\b(?:in\s+the\s+(morning|afternoon|evening)|at\s+(night))\b")?,
            radius: Regex::new(
                r"(?i)\bwithin\s+(\d+(?:\.\d+)?)\s*(m|meters?|metres?|km|kilometers?|kilometres?|mi|miles?)\b",
            )?,
            location_messages: [
                Regex::new(
                    r"(?i)^\s*(?:please\s+)?remind\s+me\s+(?:to\s+)?(?P<msg>.+?)\s*,?\s+(?:when(?:ever)?|as\s+soon\s+as|once|every\s+time|each\s+time|after|before|if)\s+i\b",
                )?,
                Regex::new(&format!(
                    r"(?i)^\s*(?:please\s+)?remind\s+me\s+(?:to\s+)?(?P<msg>.+?)\s+(?:{PLACE_PREP}|in)\s+{PLACE_ARTICLE}{place_or_coords}"
                ))?,
                Regex::new(&format!(
                    r"(?i){place_or_coords}\s*,?\s*(?:(?:please\s+)?remind\s+me\s+)?to\s+(?P<msg>.+)$"
                ))?,
                Regex::new(r"(?i)^\s*(?:please\s+)?remind\s+me\s+(?:to\s+)?(?P<msg>.+?)\s*[.!]?$")?,
            ],
            trigger_start: Regex::new(r"(?i)^(?:every\s+time|each\s+time|whenever|when|once|as\s+soon\s+as)\b")?,
            location_msg_tail: Regex::new(&format!(
                r"(?i)\s*,?\s+(?:every\s+time|each\s+time|whenever|always|every\s+day|daily|on\s+weekdays|on\s+weekends|every\s+weekday|every\s+weekend|(?:on|every)\s+(?:{WEEKDAY_ALT}).*|in\s+the\s+(?:morning|afternoon|evening)|at\s+night|between\s+.+|within\s+.+)\s*[.!]?$"
            ))?,
            trigger_clause: Regex::new(
                r"(?i)\s*,?\s*\b(?:when(?:ever)?|as\s+soon\s+as|once|every\s+time|each\s+time)\s+i\b.*$",
            )?,

            amount: Regex::new(
                r"(?i)(?:(?P<cur1>\$|\b(?:birr|etb|usd|eur|gbp))\s*(?P<amt1>\d[\d,]*(?:\.\d+)?)|\b(?P<amt2>\d[\d,]*(?:\.\d+)?)\s*(?P<cur2>birr|etb|usd|eur|gbp|dollars?|euros?)\b)",
            )?,
            expense_keywords: Regex::new(
                r"(?i)\b(?:spent|spend|spending|paid|pay|paying|bought|buy|purchased?|cost|costs|expense|gave|sent|lost|withdrew)\b",
            )?,
            income_keywords: Regex::new(
                r"(?i)\b(?:received|receive|earned|earn|got\s+paid|salary|income|deposited|deposit|sold|refund(?:ed)?)\b",
            )?,
            finance_description: Regex::new(r"(?i)^\s*(?:on|for|at|from|to)\s+(?P<desc>.+?)\s*[.!]?$")?,
        })
    }
}

/// All place keywords, longest first so alternation prefers "grocery store"
/// over "store".
fn place_alternation() -> String {
    let mut words: Vec<&str> = NAMED_PLACES
        .iter()
        .copied()
        .chain(CATEGORY_KEYWORDS.iter().flat_map(|(_, kws)| kws.iter().copied()))
        .collect();
    words.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    words
        .iter()
        .map(|w| regex::escape(w).replace(' ', r"\s+"))
        .collect::<Vec<_>>()
        .join("|")
}

/// Category for a matched place keyword, if it is a generic one.
pub fn category_for(keyword: &str) -> Option<PlaceCategory> {
    let normalized = normalize_spaces(keyword);
    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, kws)| kws.iter().any(|k| *k == normalized))
        .map(|(cat, _)| *cat)
}

pub fn is_named_place(keyword: &str) -> bool {
    NAMED_PLACES.contains(&normalize_spaces(keyword).as_str())
}

/// 1 = Monday .. 7 = Sunday.
pub fn weekday_from_name(name: &str) -> Option<u8> {
    let lower = name.to_lowercase();
    WEEKDAYS
        .iter()
        .position(|d| *d == lower)
        .map(|i| i as u8 + 1)
}

pub fn normalize_spaces(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn library_compiles() {
        PatternLibrary::new().unwrap();
    }

    #[test]
    fn longest_place_keyword_wins() {
        let p = PatternLibrary::new().unwrap();
        let caps = p.place.captures("remind me to buy milk at the grocery store").unwrap();
        assert_eq!(&caps["place"], "grocery store");
        assert_eq!(category_for(&caps["place"]), Some(PlaceCategory::Grocery));
    }

    #[test]
    fn named_places_need_a_preposition() {
        let p = PatternLibrary::new().unwrap();
        assert!(p.place.captures("remind me to work out at 6pm").is_none());
        assert!(p.place.captures("when I get to work").is_some());
        assert!(is_named_place("Work"));
    }

    #[test]
    fn weekday_numbers() {
        assert_eq!(weekday_from_name("Monday"), Some(1));
        assert_eq!(weekday_from_name("sunday"), Some(7));
        assert_eq!(weekday_from_name("someday"), None);
    }
}
