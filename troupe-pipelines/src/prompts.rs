//! Prompt construction for every generator call made by the pipelines.
//!
//! The wording is deliberately plain; what matters to the graphs is the
//! reply format each prompt asks for, since that is what the parsers read.

use troupe_core::GenerationRequest;

use crate::review::ArtifactKind;

const NONE: &str = "none";

fn or_none(text: &str) -> &str {
    if text.trim().is_empty() {
        NONE
    } else {
        text
    }
}

pub fn research_reflect(topic: &str, data: &str) -> GenerationRequest {
    GenerationRequest::new(format!(
        "Judge whether the collected material covers the topic '{topic}' well enough.\n\n\
         [Material]\n{data}\n\n\
         Answer only PASS if it is comprehensive, or FAIL if it is thin or one-sided."
    ))
    .with_system("You are a strict research lead.")
    .with_temperature(0.0)
}

pub fn research_follow_up_query(topic: &str, data: &str) -> GenerationRequest {
    let excerpt: String = data.chars().take(2000).collect();
    GenerationRequest::new(format!(
        "The material collected on '{topic}' is not sufficient.\n\n\
         [Current material]\n{excerpt}\n\n\
         Suggest one concrete search query that fills the biggest gap. \
         Reply with the query only."
    ))
    .with_system("You are a seasoned researcher.")
    .with_temperature(0.0)
}

pub fn research_summary(topic: &str, data: &str) -> GenerationRequest {
    GenerationRequest::new(format!(
        "Summarise the key points about '{topic}' from the material below.\n\n{data}"
    ))
    .with_temperature(0.0)
}

pub fn writer_draft(
    topic: &str,
    research: &str,
    code: &str,
    design: &str,
    critique: &str,
) -> GenerationRequest {
    GenerationRequest::new(format!(
        "Write the document that best fits the topic '{topic}'.\n\n\
         [Inputs]\n\
         1. Research: {research}\n\
         2. Code example: {code}\n\
         3. Diagram (Mermaid): {design}\n\
         4. Previous critique: {critique}\n\n\
         Use a tutorial or technical format when code or a diagram is provided, \
         otherwise pick an essay, proposal or report format. Embed code in a \
         ```python block and diagrams in a ```mermaid block, only when provided. \
         Give the document an introduction, a body and a conclusion.",
        research = or_none(research),
        code = or_none(code),
        design = or_none(design),
        critique = or_none(critique),
    ))
    .with_system("You are a senior editor.")
}

pub fn writer_review(topic: &str, draft: &str) -> GenerationRequest {
    GenerationRequest::new(format!(
        "Critically review whether the text fully addresses '{topic}'.\n\n\
         Criteria: relevance to the topic, concrete facts and examples, logical structure.\n\
         Give less than 7 to anything vague or ordinary and never more than 9 to \
         anything imperfect.\n\n\
         Format: <score>/<specific feedback>, for example \
         6.5/drifts off topic and lacks examples\n\n\
         [Text]\n{draft}"
    ))
    .with_system("You are a demanding chief editor.")
    .with_temperature(0.0)
}

pub fn artifact_draft(kind: ArtifactKind, topic: &str) -> GenerationRequest {
    let body = match kind {
        ArtifactKind::Code => format!(
            "Write an example Python program about '{topic}'.\n\
             It must run, carry detailed comments, and be returned as plain code."
        ),
        ArtifactKind::Design => format!(
            "Write a Mermaid diagram that best explains the structure or flow of '{topic}'.\n\
             Choose between `graph TD` and `sequenceDiagram`. Return Mermaid code only, \
             without a markdown fence."
        ),
    };
    GenerationRequest::new(body).with_system(match kind {
        ArtifactKind::Code => "You are a senior Python developer.",
        ArtifactKind::Design => "You are a systems architect.",
    })
}

pub fn artifact_review(kind: ArtifactKind, artifact: &str) -> GenerationRequest {
    let criteria = match kind {
        ArtifactKind::Code => "no syntax errors, sufficient comments, runnable structure",
        ArtifactKind::Design => "valid Mermaid syntax and a faithful picture of the topic",
    };
    GenerationRequest::new(format!(
        "Review the {label} below against: {criteria}.\n\n\
         [{label}]\n{artifact}\n\n\
         Reply in exactly this format:\n\
         STATUS: PASS or FAIL\n\
         FEEDBACK: concrete problems or improvements",
        label = kind.label(),
    ))
    .with_system("You are a meticulous reviewer.")
    .with_temperature(0.0)
}

pub fn artifact_revise(kind: ArtifactKind, artifact: &str, critique: &str) -> GenerationRequest {
    GenerationRequest::new(format!(
        "Apply the reviewer's feedback to the {label}.\n\n\
         [Current {label}]\n{artifact}\n\n\
         [Feedback]\n{critique}\n\n\
         Reply with the complete revised {label} only.",
        label = kind.label(),
    ))
}

pub fn supervisor(request: &str, status: &str) -> GenerationRequest {
    GenerationRequest::new(format!(
        "[User request]: \"{request}\"\n\n\
         [Current artifacts]\n{status}\n\n\
         Rules:\n\
         1. If final_doc is present, answer FINISH and nothing else.\n\
         2. Never call a team whose artifact is already present.\n\
         3. Call code_subgraph or designer_subgraph only when the request asks for an \
         implementation, algorithm, design or diagram.\n\
         4. Once the needed material exists and final_doc is missing, call writer_subgraph.\n\
         5. Teams that are all needed may be called together.\n\n\
         Reply with JSON: {{\"next\": [one or more of research_subgraph, code_subgraph, \
         designer_subgraph, writer_subgraph, FINISH], \"reasoning\": \"why\"}}"
    ))
    .with_system("You are a project manager assigning work to specialist teams.")
    .with_temperature(0.0)
}

pub fn trip_router(location: &str, situation: &str, message: &str) -> GenerationRequest {
    GenerationRequest::new(format!(
        "Location: {location}\nSituation: {situation}\n\nMessage: {message}\n\n\
         Is the traveller speaking to the character in the scene (role-play), or asking \
         about the language or situation (question)? \
         Reply with JSON: {{\"target\": \"clerk\"}} for role-play or \
         {{\"target\": \"tutor\"}} for a question."
    ))
    .with_system("You route messages for a language learning app.")
    .with_temperature(0.0)
}

pub fn clerk(location: &str, situation: &str, context: &str, transcript: &str) -> GenerationRequest {
    GenerationRequest::new(format!(
        "Context:\n{context}\n\nConversation so far:\n{transcript}\n\nReply as the clerk."
    ))
    .with_system(format!(
        "You are a member of staff at {location}. The situation is: {situation}. \
         Play a realistic counterpart for a traveller learning the language. Base your \
         offers on the menu or info in the context, ask one thing at a time, react \
         naturally and keep to one or two sentences."
    ))
    .with_temperature(0.7)
}

pub fn tutor(context: &str, transcript: &str) -> GenerationRequest {
    GenerationRequest::new(format!(
        "Context:\n{context}\n\nConversation so far:\n{transcript}\n\nReply as the tutor."
    ))
    .with_system(
        "You are a helpful language tutor. The traveller is practising a travel scene and \
         needs help. Explain clearly, suggest natural expressions, and guide them back to \
         the role-play.",
    )
    .with_temperature(0.5)
}

pub fn guide_queries(location: &str, situation: &str) -> GenerationRequest {
    GenerationRequest::new(format!(
        "Location: {location}\nSituation: {situation}\n\n\
         Write two search queries:\n\
         1. specific_query: finds menus, prices and tips for this exact place.\n\
         2. general_query: finds vlogs or ordering guides for the brand or kind of \
         place (e.g. 'Starbucks', 'convenience store'), with words like 'how to order'.\n\n\
         Reply with JSON: {{\"specific_query\": \"...\", \"general_query\": \"...\"}}"
    ))
    .with_system("You are a search query optimizer for a travel guide.")
    .with_temperature(0.0)
}

pub fn guide_compose(location: &str, situation: &str, web: &str, video: &str) -> GenerationRequest {
    GenerationRequest::new(format!(
        "Location: {location}\nSituation: {situation}\n\n\
         [Web search]\n{}\n\n[Video guides]\n{}\n\n\
         Work out the local language of the location and build a practice guide from the \
         material above, preferring real dialogue from the videos for the conversation flow. \
         Write expressions as `target language - (pronunciation) - meaning`.\n\n\
         Reply with JSON holding four string lists: speaking_expressions (5), \
         listening_expressions (5), focused_vocabulary (5 to 7, menu items included) and \
         conversation_flow (step by step).",
        or_none(web),
        or_none(video),
    ))
    .with_system("You are an expert travel guide writer.")
    .with_temperature(0.0)
}
