//! Prompt templates for question answering

/// Answer from retrieved context only
pub fn text_qa_prompt(context: &str, query: &str) -> String {
    format!(
        "Context information is below.\n\
---------------------\n\
{context}\n\
---------------------\n\
Given the context information and not prior knowledge, answer the query.\n\
Query: {query}\n\
Answer: "
    )
}

/// Improve an existing answer with more context
pub fn refine_prompt(query: &str, existing_answer: &str, context: &str) -> String {
    format!(
        "The original query is as follows: {query}\n\
We have provided an existing answer: {existing_answer}\n\
We have the opportunity to refine the existing answer (only if needed) with some more context below.\n\
------------\n\
{context}\n\
------------\n\
Given the new context, refine the original answer to better answer the query. \
If the context isn't useful, return the original answer.\n\
Refined Answer: "
    )
}
