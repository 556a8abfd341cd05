//! Renders predicate trees into parameterised SQL over the `matches` table.
//!
//! Column names come from a fixed match on `Field`; every value is bound
//! as a parameter. Nothing from a request is spliced into SQL text.

use crate::{
    error::{StatsError, StatsResult},
    predicate::{Field, Operand, Predicate, Value},
    types::Seat,
};
use rusqlite::types::Value as SqlValue;

pub(crate) struct SqlFilter {
    pub clause: String,
    pub params: Vec<SqlValue>,
}

pub(crate) fn render(predicate: &Predicate, alias: &str) -> StatsResult<SqlFilter> {
    let mut params = Vec::new();
    let clause = render_into(predicate, alias, &mut params)?;
    Ok(SqlFilter { clause, params })
}

fn seat_column(alias: &str, seat: Seat, suffix: &str) -> String {
    format!("{alias}.player{}_{suffix}", seat.number())
}

fn column(field: Field, alias: &str) -> StatsResult<String> {
    Ok(match field {
        Field::MatchId => format!("{alias}.id"),
        Field::PlayerId(seat) => seat_column(alias, seat, "id"),
        Field::Civ(seat) => seat_column(alias, seat, "civilization"),
        Field::Victory(seat) => seat_column(alias, seat, "victory"),
        Field::Flag { seat, bit } if bit < 32 => {
            format!("(({} >> {bit}) & 1)", seat_column(alias, seat, "flags"))
        }
        Field::MapId => format!("{alias}.map_id"),
        Field::LadderId => format!("{alias}.ladder_id"),
        Field::Patch => format!("{alias}.patch_number"),
        Field::Rating => format!("{alias}.average_rating"),
        other => {
            return Err(StatsError::Other(anyhow::anyhow!(
                "{other:?} is not a column of the matches table"
            )))
        }
    })
}

fn bind(value: &Value) -> SqlValue {
    match value {
        Value::Int(v) => SqlValue::Integer(*v),
        Value::Float(v) => SqlValue::Real(*v),
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
    }
}

fn join(
    terms: &[Predicate],
    glue: &str,
    empty: &str,
    alias: &str,
    params: &mut Vec<SqlValue>,
) -> StatsResult<String> {
    if terms.is_empty() {
        return Ok(empty.to_string());
    }
    let parts = terms
        .iter()
        .map(|t| render_into(t, alias, params))
        .collect::<StatsResult<Vec<_>>>()?;
    Ok(format!("({})", parts.join(glue)))
}

fn render_into(
    predicate: &Predicate,
    alias: &str,
    params: &mut Vec<SqlValue>,
) -> StatsResult<String> {
    Ok(match predicate {
        Predicate::Equals { field, value } => {
            params.push(bind(value));
            format!("{} = ?", column(*field, alias)?)
        }
        Predicate::In { field, values } => {
            if values.is_empty() {
                return Ok("0".to_string());
            }
            params.extend(values.iter().map(bind));
            let marks = vec!["?"; values.len()].join(", ");
            format!("{} IN ({marks})", column(*field, alias)?)
        }
        Predicate::And(terms) => join(terms, " AND ", "1", alias, params)?,
        Predicate::Or(terms) => join(terms, " OR ", "0", alias, params)?,
        Predicate::Not(inner) => format!("NOT ({})", render_into(inner, alias, params)?),
        Predicate::Compare { field, op, rhs } => {
            let lhs = column(*field, alias)?;
            let rhs = match rhs {
                Operand::Value(v) => {
                    params.push(bind(v));
                    "?".to_string()
                }
                Operand::Field(f) => column(*f, alias)?,
            };
            format!("{lhs} {} {rhs}", op.sql())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::CompareOp;

    #[test]
    fn renders_bound_parameters() {
        let p = Predicate::all_of([
            Predicate::one_of(Field::LadderId, &[3, 4]),
            Predicate::compare(Field::Rating, CompareOp::Ge, 1000),
            Predicate::compare_fields(Field::Civ(Seat::One), CompareOp::Eq, Field::Civ(Seat::Two))
                .negate(),
        ]);
        let sql = render(&p, "m").expect("renders");
        assert_eq!(
            sql.clause,
            "(m.ladder_id IN (?, ?) AND m.average_rating >= ? AND NOT (m.player1_civilization = m.player2_civilization))"
        );
        assert_eq!(sql.params.len(), 3);
    }

    #[test]
    fn flag_bits_render_as_shift_and_mask() {
        let p = Predicate::equals(Field::Flag { seat: Seat::Two, bit: 5 }, true);
        let sql = render(&p, "m").expect("renders");
        assert_eq!(sql.clause, "((m.player2_flags >> 5) & 1) = ?");
        assert_eq!(sql.params, vec![SqlValue::Integer(1)]);
    }

    #[test]
    fn empty_connectives_render_as_constants() {
        assert_eq!(render(&Predicate::always(), "m").expect("renders").clause, "1");
        assert_eq!(render(&Predicate::Or(vec![]), "m").expect("renders").clause, "0");
    }

    #[test]
    fn summary_fields_are_rejected() {
        assert!(render(&Predicate::equals(Field::Opening1, 2), "m").is_err());
    }
}
