use anyhow::{bail, Result};
use serde_json::{json, Value};
use std::io::Write;
use time::format_description::well_known::Rfc3339;
use trawl_core::indexes::layout;
use trawl_core::{EnglishTokenizer, IndexSet, VectorSpaceModel};

/// Writes every entry of the named store as one JSON object per line.
/// Returns the number of entries written.
pub fn dump<W: Write>(indexes: &IndexSet, store: &str, out: &mut W) -> Result<usize> {
    match store {
        layout::DOCUMENT_IDS => emit(out, indexes.documents.forward.entries(), |(key, id)| json!({ "key": key, "id": id })),
        layout::REVERSE_DOCUMENT_IDS => emit(out, indexes.documents.reverse.entries(), |(id, key)| json!({ "id": id, "key": key })),
        layout::TERM_IDS => emit(out, indexes.terms.forward.entries(), |(key, id)| json!({ "key": key, "id": id })),
        layout::REVERSE_TERM_IDS => emit(out, indexes.terms.reverse.entries(), |(id, key)| json!({ "id": id, "key": key })),
        layout::TITLE_POSTINGS => emit(out, indexes.title_postings.entries(), |(term_id, postings)| json!({ "term_id": term_id, "postings": postings })),
        layout::CONTENT_POSTINGS => emit(out, indexes.content_postings.entries(), |(term_id, postings)| json!({ "term_id": term_id, "postings": postings })),
        layout::DOCUMENT_TERMS => emit(out, indexes.document_terms.entries(), |(doc_id, terms)| json!({ "doc_id": doc_id, "terms": terms })),
        layout::DOCUMENT_TITLE_TERMS => emit(out, indexes.title_terms.entries(), |(doc_id, terms)| json!({ "doc_id": doc_id, "title_terms": terms })),
        layout::PARENT_CHILD => emit(out, indexes.children.entries(), |(doc_id, children)| json!({ "doc_id": doc_id, "children": children })),
        layout::CHILD_PARENT => emit(out, indexes.parents.entries(), |(doc_id, parents)| json!({ "doc_id": doc_id, "parents": parents })),
        layout::PAGE_METADATA => emit(out, indexes.pages.entries(), |(doc_id, page)| {
            json!({
                "doc_id": doc_id,
                "title": page.title,
                "url": page.url,
                "size_bytes": page.size_bytes,
                "last_modified": page.last_modified.format(&Rfc3339).unwrap_or_default(),
            })
        }),
        layout::DOCUMENT_LENGTHS => emit(out, indexes.lengths.entries(), |(doc_id, length)| json!({ "doc_id": doc_id, "length": length })),
        other => bail!("unknown store {other:?}, expected one of {}", layout::ALL.join(", ")),
    }
}

fn emit<W, T, I, F>(out: &mut W, entries: I, render: F) -> Result<usize>
where
    W: Write,
    I: Iterator<Item = trawl_core::Result<T>>,
    F: Fn(T) -> Value,
{
    let mut written = 0;
    for entry in entries {
        writeln!(out, "{}", render(entry?))?;
        written += 1;
    }
    Ok(written)
}

/// Ranks the corpus against `text` and writes the top `k` hits as JSON lines.
pub fn query<W: Write>(indexes: &IndexSet, text: &str, k: usize, out: &mut W) -> Result<usize> {
    let vsm = VectorSpaceModel::new(indexes, &EnglishTokenizer);
    let hits = vsm.search(text, k)?;
    for (rank, (doc_id, score)) in hits.iter().enumerate() {
        let page = indexes.pages.get_or_default(*doc_id)?;
        let line = json!({ "rank": rank + 1, "doc_id": doc_id, "score": score, "title": page.title, "url": page.url });
        writeln!(out, "{line}")?;
    }
    Ok(hits.len())
}

/// Deletes the document stored under `url`, returning its retired id.
pub fn remove(indexes: &IndexSet, url: &str) -> Result<u64> {
    let doc_id = match indexes.documents.id_of(url) {
        Ok(id) => id,
        Err(e) if e.is_not_found() => bail!("no document for {url}"),
        Err(e) => return Err(e.into()),
    };
    indexes.remove_document(doc_id)?;
    Ok(doc_id)
}
