use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Display;

/// One of the three counters kept for every entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CounterField {
    Read,
    Like,
    Collect,
}

impl CounterField {
    pub const ALL: [CounterField; 3] = [Self::Read, Self::Like, Self::Collect];

    /// Name of the hash field this counter is stored under.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read_cnt",
            Self::Like => "like_cnt",
            Self::Collect => "collect_cnt",
        }
    }
}

impl Display for CounterField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Engagement counters of a single entity.
///
/// The fields are independent: nothing here checks that, say, `like_cnt`
/// stays below `read_cnt`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterRecord {
    pub biz_id: i64,
    pub read_cnt: i64,
    pub like_cnt: i64,
    pub collect_cnt: i64,
}

impl CounterRecord {
    pub fn get(&self, field: CounterField) -> i64 {
        match field {
            CounterField::Read => self.read_cnt,
            CounterField::Like => self.like_cnt,
            CounterField::Collect => self.collect_cnt,
        }
    }

    /// Add `delta` to one field and return its new value.
    ///
    /// Returns `None` and leaves the record untouched when the result would
    /// not fit in an `i64`, the same way `HINCRBY` refuses it.
    pub fn apply(&mut self, field: CounterField, delta: i64) -> Option<i64> {
        let slot = match field {
            CounterField::Read => &mut self.read_cnt,
            CounterField::Like => &mut self.like_cnt,
            CounterField::Collect => &mut self.collect_cnt,
        };
        *slot = slot.checked_add(delta)?;
        Some(*slot)
    }

    /// Field/value pairs written by a single multi-field `HSET`.
    pub fn to_fields(&self) -> [(&'static str, i64); 3] {
        CounterField::ALL.map(|field| (field.as_str(), self.get(field)))
    }

    /// Rebuild a record from a stored hash.
    ///
    /// Parsing is lenient: a field that is missing or does not hold an
    /// integer reads as zero instead of failing the whole lookup.
    pub fn from_fields(biz_id: i64, fields: &HashMap<String, String>) -> Self {
        let parse = |field: CounterField| {
            fields
                .get(field.as_str())
                .and_then(|v| v.trim().parse::<i64>().ok())
                .unwrap_or_default()
        };

        Self {
            biz_id,
            read_cnt: parse(CounterField::Read),
            like_cnt: parse(CounterField::Like),
            collect_cnt: parse(CounterField::Collect),
        }
    }
}

#[test]
fn test_lenient_parsing() {
    let fields = HashMap::from([
        ("read_cnt".to_string(), "10".to_string()),
        ("like_cnt".to_string(), "not-a-number".to_string()),
        ("unrelated".to_string(), "5".to_string()),
    ]);

    let record = CounterRecord::from_fields(42, &fields);
    assert_eq!(
        record,
        CounterRecord {
            biz_id: 42,
            read_cnt: 10,
            like_cnt: 0,
            collect_cnt: 0,
        }
    );
}

#[test]
fn test_apply_touches_one_field() {
    let mut record = CounterRecord {
        biz_id: 1,
        read_cnt: 10,
        like_cnt: 3,
        collect_cnt: 1,
    };
    assert_eq!(record.apply(CounterField::Like, -1), Some(2));
    assert_eq!(record.apply(CounterField::Collect, 1), Some(2));

    assert_eq!(record.read_cnt, 10);
    assert_eq!(record.like_cnt, 2);
    assert_eq!(record.collect_cnt, 2);
}

#[test]
fn test_apply_refuses_overflow() {
    let mut record = CounterRecord {
        biz_id: 1,
        read_cnt: i64::MAX,
        like_cnt: i64::MIN,
        collect_cnt: 0,
    };
    let before = record;

    assert_eq!(record.apply(CounterField::Read, 1), None);
    assert_eq!(record.apply(CounterField::Like, -1), None);
    assert_eq!(record, before);

    assert_eq!(record.apply(CounterField::Read, -1), Some(i64::MAX - 1));
}

#[test]
fn test_field_pairs() {
    let record = CounterRecord {
        biz_id: 9,
        read_cnt: 1,
        like_cnt: 2,
        collect_cnt: 3,
    };
    assert_eq!(
        record.to_fields(),
        [("read_cnt", 1), ("like_cnt", 2), ("collect_cnt", 3)]
    );
}
