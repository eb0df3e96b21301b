//! A short trip-talk conversation: the scene guide is built first, then
//! role-play lines go to the café clerk and questions go to the tutor.

use std::sync::Arc;

use troupe_core::{InMemoryCheckpointer, StateUpdate};
use troupe_demos::{CannedGenerator, CannedSearch};
use troupe_pipelines::trip_talk::user_turn;
use troupe_pipelines::{guide_graph, trip_talk_graph, ChatMessage, GuideState, PipelineDeps};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    troupe_demos::init();

    let deps = PipelineDeps::new(Arc::new(CannedGenerator::default()))
        .with_search(Arc::new(CannedSearch));
    let guide = guide_graph(&deps)?
        .invoke(GuideState::new("a café in Lyon", "ordering breakfast"))
        .await?;
    tracing::info!(vocabulary = ?guide.data.guide.focused_vocabulary, "scene guide ready");

    let graph = trip_talk_graph(&deps, InMemoryCheckpointer::default())?;
    let opening = guide
        .data
        .scene()
        .messages(vec![ChatMessage::user("Bonjour !")]);
    graph
        .invoke_thread("traveller-1", StateUpdate::new(opening))
        .await?;

    let mut last = None;
    for line in ["How do I order politely?", "Je voudrais un croissant."] {
        last = Some(graph.invoke_thread("traveller-1", user_turn(line)).await?);
    }

    if let Some(state) = last {
        println!("{}", troupe_pipelines::transcript(&state.data.messages));
    }
    Ok(())
}
