use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use proptest::test_runner::Config;
use retro_store_lib::{CardRow, Category, Project, ProjectRow};

const PROJECT: &str = "p1";

fn project_row() -> ProjectRow {
    ProjectRow {
        id: PROJECT.to_string(),
        name: "Sprint".to_string(),
        created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    }
}

fn known_tag() -> impl Strategy<Value = String> {
    prop_oneof![Just("whatWentWell"), Just("toImprove"), Just("actionItems")].prop_map(String::from)
}

fn unknown_tag() -> impl Strategy<Value = String> {
    "[A-Za-z_ ]{0,16}".prop_filter("tag must be unknown", |tag| Category::from_tag(tag).is_none())
}

/// Rows with unique ids built from generated fields
fn rows_with(tag: impl Strategy<Value = String>) -> impl Strategy<Value = Vec<CardRow>> {
    prop::collection::vec(("\\PC{0,40}", any::<u32>(), any::<u32>(), 0_i64..4_000_000_000_i64, tag), 0..24).prop_map(
        |fields| {
            fields
                .into_iter()
                .enumerate()
                .map(|(i, (text, likes, dislikes, secs, swimlane))| CardRow {
                    id: format!("card-{}", i),
                    project_id: PROJECT.to_string(),
                    text,
                    likes,
                    dislikes,
                    swimlane,
                    created_at: Utc.timestamp_opt(secs, 0).unwrap(),
                })
                .collect()
        },
    )
}

type CardTuple = (String, String, u32, u32, i64, String);

fn tuples<'a>(rows: impl IntoIterator<Item = &'a CardRow>) -> Vec<CardTuple> {
    let mut out: Vec<CardTuple> = rows
        .into_iter()
        .map(|r| (r.id.clone(), r.text.clone(), r.likes, r.dislikes, r.created_at.timestamp(), r.swimlane.clone()))
        .collect();
    out.sort();
    out
}

proptest! {
    #![proptest_config(Config::with_cases(128))]
    #[test]
    fn grouping_then_flattening_keeps_every_card(rows in rows_with(known_tag())) {
        let project = Project::from_rows(project_row(), rows.clone());

        prop_assert_eq!(project.cards.len(), rows.len());
        prop_assert_eq!(tuples(&project.card_rows()), tuples(&rows));

        // Store order is kept inside each category
        for category in Category::ALL {
            let expected: Vec<&str> = rows
                .iter()
                .filter(|r| r.swimlane == category.as_tag())
                .map(|r| r.id.as_str())
                .collect();
            let grouped: Vec<&str> = project.cards.get(category).iter().map(|c| c.id.as_str()).collect();
            prop_assert_eq!(grouped, expected);
        }
    }

    #[test]
    fn unknown_tags_never_reach_the_board(rows in rows_with(prop_oneof![known_tag(), unknown_tag()])) {
        let project = Project::from_rows(project_row(), rows.clone());
        let known: Vec<&CardRow> = rows.iter().filter(|r| r.category().is_some()).collect();

        prop_assert_eq!(project.cards.len(), known.len());
        prop_assert_eq!(tuples(&project.card_rows()), tuples(known));
    }
}
