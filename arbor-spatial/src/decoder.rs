use arbor::{GraphStore, NodeId};

use crate::envelope::Envelope;
use crate::error::{SpatialError, SpatialResult};

/// Extracts the bounding envelope of a user geometry record.
///
/// Geometry records belong to the caller's domain model; the index never
/// interprets them beyond this trait. Implementations typically read a
/// property the caller maintains on the record.
pub trait EnvelopeDecoder: Send + Sync {
    fn decode_envelope(&self, geometry: NodeId) -> SpatialResult<Envelope>;
}

/// Decoder reading the envelope from a 4-double array property
/// (`[min_x, min_y, max_x, max_y]`) on the geometry record.
pub struct PropertyEnvelopeDecoder {
    store: GraphStore,
    property: String,
}

impl PropertyEnvelopeDecoder {
    pub fn new(store: GraphStore, property: &str) -> Self {
        PropertyEnvelopeDecoder {
            store,
            property: property.to_string(),
        }
    }
}

impl EnvelopeDecoder for PropertyEnvelopeDecoder {
    fn decode_envelope(&self, geometry: NodeId) -> SpatialResult<Envelope> {
        let value = self.store.get_property(geometry, &self.property)?;
        let value = value.ok_or_else(|| {
            SpatialError::InvalidArgument(format!(
                "geometry record {} has no '{}' property",
                geometry, self.property
            ))
        })?;
        let values = value.as_double_array().ok_or_else(|| {
            SpatialError::InvalidArgument(format!(
                "property '{}' on geometry record {} is not a double array",
                self.property, geometry
            ))
        })?;
        Envelope::from_array(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor::{MemoryGraphStore, PropertyValue};

    #[test]
    fn decodes_array_property() {
        let store = GraphStore::new(MemoryGraphStore::new());
        let geom = store.create_node().unwrap();
        store
            .set_property(geom, "bbox", PropertyValue::DoubleArray(vec![1.0, 2.0, 3.0, 4.0]))
            .unwrap();

        let decoder = PropertyEnvelopeDecoder::new(store, "bbox");
        let env = decoder.decode_envelope(geom).unwrap();
        assert_eq!(env, Envelope::new(1.0, 2.0, 3.0, 4.0));
    }

    #[test]
    fn missing_property_is_invalid_argument() {
        let store = GraphStore::new(MemoryGraphStore::new());
        let geom = store.create_node().unwrap();

        let decoder = PropertyEnvelopeDecoder::new(store, "bbox");
        assert!(matches!(
            decoder.decode_envelope(geom),
            Err(SpatialError::InvalidArgument(_))
        ));
    }

    #[test]
    fn wrong_type_is_invalid_argument() {
        let store = GraphStore::new(MemoryGraphStore::new());
        let geom = store.create_node().unwrap();
        store
            .set_property(geom, "bbox", PropertyValue::Int(1))
            .unwrap();

        let decoder = PropertyEnvelopeDecoder::new(store, "bbox");
        assert!(matches!(
            decoder.decode_envelope(geom),
            Err(SpatialError::InvalidArgument(_))
        ));
    }
}
