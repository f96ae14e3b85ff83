//! Chapter drag-and-drop move semantics.
//!
//! A move removes the chapter from its act and splices the same object back
//! in next to the drop target. Forward moves inside one act and moves across
//! acts land after the target; backward moves inside one act land before it.
//! The target's index is always looked up again after the removal, so the
//! shift caused by removing an earlier chapter never leaks into the result.

use crate::formats::{Act, ActId, ChapterId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Moved { act: ActId, index: usize },
    Unchanged(Unchanged),
}

impl MoveOutcome {
    pub fn is_moved(&self) -> bool {
        matches!(self, MoveOutcome::Moved { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unchanged {
    /// The chapter was dropped on itself.
    SelfDrop,
    /// An act or chapter id did not resolve.
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    Before,
    After,
}

pub fn move_chapter(
    acts: &mut [Act],
    chapter_id: ChapterId,
    from_act: ActId,
    to_act: ActId,
    target_id: ChapterId,
) -> MoveOutcome {
    if chapter_id == target_id {
        return MoveOutcome::Unchanged(Unchanged::SelfDrop);
    }

    let Some(from_idx) = acts.iter().position(|a| a.id == from_act) else {
        tracing::debug!(%from_act, "move chapter: source act not found");
        return MoveOutcome::Unchanged(Unchanged::NotFound);
    };
    let Some(to_idx) = acts.iter().position(|a| a.id == to_act) else {
        tracing::debug!(%to_act, "move chapter: destination act not found");
        return MoveOutcome::Unchanged(Unchanged::NotFound);
    };
    let Some(dragged_index) = acts[from_idx]
        .chapters
        .iter()
        .position(|c| c.id == chapter_id)
    else {
        tracing::debug!(%chapter_id, %from_act, "move chapter: chapter not found");
        return MoveOutcome::Unchanged(Unchanged::NotFound);
    };
    let Some(target_index) = acts[to_idx]
        .chapters
        .iter()
        .position(|c| c.id == target_id)
    else {
        tracing::debug!(%target_id, %to_act, "move chapter: target not found");
        return MoveOutcome::Unchanged(Unchanged::NotFound);
    };

    let placement = if from_idx == to_idx && dragged_index > target_index {
        Placement::Before
    } else {
        Placement::After
    };

    let chapter = acts[from_idx].chapters.remove(dragged_index);

    let destination = &mut acts[to_idx].chapters;
    let Some(anchor) = destination.iter().position(|c| c.id == target_id) else {
        acts[from_idx].chapters.insert(dragged_index, chapter);
        return MoveOutcome::Unchanged(Unchanged::NotFound);
    };

    let index = match placement {
        Placement::Before => anchor,
        Placement::After => anchor + 1,
    };
    destination.insert(index, chapter);

    tracing::debug!(
        %chapter_id,
        %from_act,
        %to_act,
        %target_id,
        index,
        ?placement,
        "moved chapter"
    );

    MoveOutcome::Moved { act: to_act, index }
}
