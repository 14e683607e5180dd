//! Measurement grouping
//!
//! Begin/end markers (set by display colors or by the patch file) delimit
//! runs of notes whose performance is measured together: evenness, dynamics
//! and tempo runs are independent of each other. Every sounding note from a
//! begin marker through its end marker, inclusive, receives the run's group
//! id. Ids count up from 1 per category within a part.

use crate::models::{NoteId, RoleFlags, Score};

#[derive(Clone, Copy)]
enum Category {
    Evenness,
    Dynamics,
    Tempo,
}

impl Category {
    fn begin(self, flags: &RoleFlags) -> bool {
        match self {
            Category::Evenness => flags.evenness_begin,
            Category::Dynamics => flags.dynamics_begin,
            Category::Tempo => flags.tempo_begin,
        }
    }

    fn end(self, flags: &RoleFlags) -> bool {
        match self {
            Category::Evenness => flags.evenness_end,
            Category::Dynamics => flags.dynamics_end,
            Category::Tempo => flags.tempo_end,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Category::Evenness => "evenness",
            Category::Dynamics => "dynamics",
            Category::Tempo => "tempo",
        }
    }
}

pub fn assign_groups(score: &mut Score, part_index: usize) {
    for category in [Category::Evenness, Category::Dynamics, Category::Tempo] {
        assign_category(score, part_index, category);
    }
}

fn assign_category(score: &mut Score, part_index: usize, category: Category) {
    let chain: Vec<NoteId> = score.parts[part_index].chain().collect();
    let mut next_id: u32 = 1;
    let mut open: Option<u32> = None;
    let mut open_at: Option<(usize, u64)> = None;

    for id in chain {
        let note = score.arena.note(id);
        let (sounding, begins, ends) = match note.onset() {
            Some(onset) => (
                onset.sounding,
                category.begin(&onset.flags),
                category.end(&onset.flags),
            ),
            None => continue,
        };
        if !sounding {
            continue;
        }
        let position = (note.measure_index, note.tick);

        if begins {
            if open.is_some() {
                warn_unterminated(score, part_index, category, open_at);
            }
            open = Some(next_id);
            next_id += 1;
            open_at = Some(position);
        }
        if let Some(group) = open {
            if let Some(onset) = score.arena.note_mut(id).onset_mut() {
                match category {
                    Category::Evenness => onset.group_evenness = group,
                    Category::Dynamics => onset.group_dynamics = group,
                    Category::Tempo => onset.group_tempo = group,
                }
            }
        } else if ends {
            let measure_number = score.parts[part_index]
                .measures
                .get(position.0)
                .map(|m| m.number);
            score.diagnostics.warn(
                "unmatched_group_end",
                measure_number,
                Some(position.1),
                format!("{} run ends here but none is open", category.name()),
            );
        }
        if ends && open.is_some() {
            open = None;
            open_at = None;
        }
    }

    if open.is_some() {
        warn_unterminated(score, part_index, category, open_at);
    }
}

fn warn_unterminated(
    score: &mut Score,
    part_index: usize,
    category: Category,
    open_at: Option<(usize, u64)>,
) {
    let measure_number = open_at.and_then(|(index, _)| {
        score.parts[part_index]
            .measures
            .get(index)
            .map(|m| m.number)
    });
    score.diagnostics.warn(
        "unterminated_group",
        measure_number,
        open_at.map(|(_, tick)| tick),
        format!("{} run was never closed", category.name()),
    );
}
