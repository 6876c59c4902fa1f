use crate::catalog::types::Value;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Order-preserving byte encoding of a primary key. Comparing two encoded
/// keys gives the same result as comparing their value tuples.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EncodedKey {
    bytes: SmallVec<[u8; 64]>,
}

impl EncodedKey {
    pub fn from_values(values: &[Value]) -> Self {
        let mut out = SmallVec::<[u8; 64]>::new();
        for value in values {
            encode_value(value, &mut out);
        }
        Self { bytes: out }
    }
}

fn encode_value(v: &Value, out: &mut SmallVec<[u8; 64]>) {
    match v {
        Value::Null => {
            out.push(0x00);
        }
        Value::Boolean(b) => {
            out.push(0x10);
            out.push(u8::from(*b));
        }
        Value::Integer(i) => {
            out.push(0x20);
            let shifted = (*i as u64) ^ 0x8000_0000_0000_0000;
            out.extend_from_slice(&shifted.to_be_bytes());
        }
        Value::Text(s) => {
            out.push(0x30);
            append_text(s, out);
        }
    }
}

fn append_text(s: &str, out: &mut SmallVec<[u8; 64]>) {
    for byte in s.as_bytes() {
        if *byte == 0 {
            // Escape interior nulls so the terminator stays unambiguous.
            out.extend_from_slice(&[0x00, 0xFF]);
        } else {
            out.push(*byte);
        }
    }
    out.push(0x00);
}

#[cfg(test)]
mod tests {
    use super::EncodedKey;
    use crate::catalog::types::Value;
    use proptest::prelude::*;

    #[test]
    fn integer_order_is_preserved() {
        let a = EncodedKey::from_values(&[Value::Integer(-1)]);
        let b = EncodedKey::from_values(&[Value::Integer(0)]);
        let c = EncodedKey::from_values(&[Value::Integer(42)]);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn text_parts_do_not_bleed_into_each_other() {
        let split = EncodedKey::from_values(&[Value::text("ab"), Value::text("c")]);
        let joined = EncodedKey::from_values(&[Value::text("a"), Value::text("bc")]);
        assert_ne!(split, joined);

        let nul = EncodedKey::from_values(&[Value::text("a\0b")]);
        let plain = EncodedKey::from_values(&[Value::text("a")]);
        assert!(plain < nul);
    }

    proptest! {
        #[test]
        fn composite_order_matches_tuple_order(
            a in (any::<i64>(), "[a-z]{0,8}", any::<i64>()),
            b in (any::<i64>(), "[a-z]{0,8}", any::<i64>()),
        ) {
            let ka = EncodedKey::from_values(&[Value::Integer(a.0), Value::text(&a.1), Value::Integer(a.2)]);
            let kb = EncodedKey::from_values(&[Value::Integer(b.0), Value::text(&b.1), Value::Integer(b.2)]);
            prop_assert_eq!(ka.cmp(&kb), a.cmp(&b));
        }
    }
}
