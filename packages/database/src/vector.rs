//! Helpers for passing embedding vectors through raw SQL.
//!
//! `pgvector` accepts vectors as bracketed literals (`'[0.1,0.2,...]'`)
//! cast with `::vector`, the same way `PostGIS` geometries are built from
//! raw parameters.

use emergency_line_report_models::EMBEDDING_DIM;

use crate::DbError;

/// Renders an embedding as a `pgvector` literal.
///
/// # Errors
///
/// Returns [`DbError::Conversion`] if the vector does not have exactly
/// [`EMBEDDING_DIM`] dimensions — a mismatched vector would poison every
/// similarity query against the column.
pub fn vector_literal(embedding: &[f32]) -> Result<String, DbError> {
    if embedding.len() != EMBEDDING_DIM {
        return Err(DbError::Conversion {
            message: format!(
                "embedding has {} dimensions, expected {EMBEDDING_DIM}",
                embedding.len()
            ),
        });
    }

    let mut literal = String::with_capacity(embedding.len() * 10 + 2);
    literal.push('[');
    for (i, value) in embedding.iter().enumerate() {
        if i > 0 {
            literal.push(',');
        }
        literal.push_str(&value.to_string());
    }
    literal.push(']');

    Ok(literal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_is_bracketed_and_comma_separated() {
        let mut embedding = vec![0.0f32; EMBEDDING_DIM];
        embedding[0] = 0.5;
        embedding[1] = -1.25;

        let literal = vector_literal(&embedding).unwrap();
        assert!(literal.starts_with("[0.5,-1.25,"));
        assert!(literal.ends_with(']'));
        assert_eq!(literal.matches(',').count(), EMBEDDING_DIM - 1);
    }

    #[test]
    fn wrong_dimensionality_is_rejected() {
        assert!(vector_literal(&[0.1, 0.2, 0.3]).is_err());
        assert!(vector_literal(&[]).is_err());
    }
}
