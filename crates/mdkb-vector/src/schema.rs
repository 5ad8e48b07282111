use std::collections::HashMap;
use std::sync::Arc;

use arrow_schema::{DataType, Field, Schema};

use mdkb_core::types::{Metric, FIELD_CHUNK_INDEX, FIELD_FILE_PATH, FIELD_SOURCE_FILE, FIELD_TEXT};

pub const FIELD_ID: &str = "id";
pub const FIELD_VECTOR: &str = "vector";
/// Schema metadata key holding the collection's distance metric.
pub const METRIC_KEY: &str = "mdkb.metric";

pub fn build_arrow_schema(dimension: usize, metric: Metric) -> Arc<Schema> {
    let metadata = HashMap::from([(METRIC_KEY.to_string(), metric.as_str().to_string())]);
    Arc::new(Schema::new_with_metadata(
        vec![
            Field::new(FIELD_ID, DataType::Int64, false),
            Field::new(
                FIELD_VECTOR,
                DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dimension as i32),
                true,
            ),
            Field::new(FIELD_TEXT, DataType::Utf8, false),
            Field::new(FIELD_SOURCE_FILE, DataType::Utf8, false),
            Field::new(FIELD_FILE_PATH, DataType::Utf8, false),
            Field::new(FIELD_CHUNK_INDEX, DataType::Int32, false),
        ],
        metadata,
    ))
}

/// Vector width declared by a collection schema.
pub fn vector_dimension(schema: &Schema) -> Option<usize> {
    match schema.field_with_name(FIELD_VECTOR).ok()?.data_type() {
        DataType::FixedSizeList(_, n) => Some(*n as usize),
        _ => None,
    }
}

/// Metric recorded at creation; collections without the key are treated as cosine.
pub fn schema_metric(schema: &Schema) -> Metric {
    schema.metadata().get(METRIC_KEY).and_then(|m| Metric::parse(m)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_carries_dimension_and_metric() {
        let schema = build_arrow_schema(384, Metric::L2);
        assert_eq!(vector_dimension(&schema), Some(384));
        assert_eq!(schema_metric(&schema), Metric::L2);
        assert_eq!(schema_metric(&Schema::empty()), Metric::Cosine);
        assert_eq!(vector_dimension(&Schema::empty()), None);
    }
}
