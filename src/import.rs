use tracing::info;
use uuid::Uuid;

use crate::convert::{self, Converted, ImageRef};
use crate::db::Store;
use crate::error::Result;
use crate::parser::extract::ExtractedQuestion;
use crate::parser::{self, Format};
use crate::storage::{upload_image, ObjectStore};

#[derive(Debug, Clone)]
pub struct Imported {
    pub format: Format,
    pub question_ids: Vec<Uuid>,
}

/// Bytes → markup, with every embedded image uploaded as it is met.
pub fn convert_document(bytes: &[u8], objects: &dyn ObjectStore) -> Result<Converted> {
    let mut hook = |data: &[u8], content_type: &str| -> Result<ImageRef> {
        let src = upload_image(objects, data, content_type)?;
        Ok(ImageRef { src })
    };
    convert::to_markup(bytes, &mut hook)
}

/// Question first, then its tags and children. Nothing is rolled back if a
/// later create fails.
pub fn persist_question<S: Store + ?Sized>(store: &S, x: &ExtractedQuestion) -> Result<Uuid> {
    let id = store.create_question(&x.question)?;

    let mut new_tags = 0;
    for name in &x.tags {
        if store.get_or_create_tag(name)? {
            new_tags += 1;
        }
        store.tag_question(&id, name)?;
    }
    for choice in &x.answer_choices {
        store.create_answer_choice(&id, choice)?;
    }
    for article in &x.articles {
        store.create_article(&id, article)?;
    }
    for hit in &x.quick_hits {
        let hit_id = store.create_quick_hit(&id, hit)?;
        for answer in &hit.answers {
            store.create_quick_hit_answer(&hit_id, answer)?;
        }
    }

    info!(
        question = %id,
        "created {} answer choices, {} articles, {} quick hits, {} tags ({} new)",
        x.answer_choices.len(),
        x.articles.len(),
        x.quick_hits.len(),
        x.tags.len(),
        new_tags
    );
    Ok(id)
}

pub fn persist<S: Store + ?Sized>(store: &S, questions: &[ExtractedQuestion]) -> Result<Vec<Uuid>> {
    questions.iter().map(|q| persist_question(store, q)).collect()
}

/// Convert, parse and persist one document, returning question ids in
/// document order.
pub fn import_document<S: Store + ?Sized>(
    bytes: &[u8],
    store: &S,
    objects: &dyn ObjectStore,
) -> Result<Imported> {
    let converted = convert_document(bytes, objects)?;
    let parsed = parser::parse_markup(&converted.markup)?;
    let question_ids = persist(store, &parsed.questions)?;
    info!(
        source = ?converted.kind,
        format = parsed.format.as_str(),
        "imported {} question(s)",
        question_ids.len()
    );
    Ok(Imported {
        format: parsed.format,
        question_ids,
    })
}
