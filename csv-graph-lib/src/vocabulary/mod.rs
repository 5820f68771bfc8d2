mod processor;
pub mod serializer;

pub(crate) use processor::{
    BasicVocabularyHandler, PropertiesVocabularyHandler, SubClassVocabularyHandler,
};

use crate::types::VocabularyMap;
use crate::utils::{
    expand_iri_with_base, is_absolute_iri, normalize_label_for_iri, to_camel_case, to_pascal_case,
};

/// IRI of a class declared with local id `id`.
pub(crate) fn class_iri(base_iri: &str, id: &str) -> String {
    expand_iri_with_base(base_iri, &to_pascal_case(&normalize_label_for_iri(id)))
}

/// IRI of a property declared with local id `id`.
pub(crate) fn property_iri(base_iri: &str, id: &str) -> String {
    expand_iri_with_base(base_iri, &to_camel_case(&normalize_label_for_iri(id)))
}

/// IRI for a class reference: absolute IRIs as given, then already-declared
/// classes, then the IRI the class would get if declared.
pub(crate) fn class_reference_iri(
    vocabulary: &VocabularyMap,
    base_iri: &str,
    reference: &str,
) -> String {
    let reference = reference.trim();
    if is_absolute_iri(reference) {
        return reference.to_string();
    }
    vocabulary
        .find_class(reference, base_iri)
        .map(|term| term.iri.clone())
        .unwrap_or_else(|| class_iri(base_iri, reference))
}
