//! Small SQL helpers shared by the SQLite DAOs.

use sqlx::{Encode, QueryBuilder, Sqlite, Type};

/// Appends `(?, ?, ...)` binding every value.
///
/// Callers short-circuit empty inputs; SQLite accepts `IN ()` but it never matches.
pub(crate) fn push_in_list<'args, T>(
    builder: &mut QueryBuilder<'args, Sqlite>,
    values: impl IntoIterator<Item = T>,
) where
    T: 'args + Encode<'args, Sqlite> + Type<Sqlite> + Send,
{
    builder.push("(");
    let mut separated = builder.separated(", ");
    for value in values {
        separated.push_bind(value);
    }
    separated.push_unseparated(")");
}

/// Converts a `COUNT(*)` result.
pub(crate) fn to_count(total: i64) -> u64 {
    u64::try_from(total).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_in_list() {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT id FROM nodes WHERE id IN ");
        push_in_list(&mut builder, [1_i64, 2, 3]);
        assert_eq!(builder.sql(), "SELECT id FROM nodes WHERE id IN (?, ?, ?)");
    }

    #[test]
    fn test_to_count() {
        assert_eq!(to_count(5), 5);
        assert_eq!(to_count(-1), 0);
    }
}
