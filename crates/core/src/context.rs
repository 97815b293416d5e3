use crate::models::{AssembledContext, RetrievedResult};

pub const UNKNOWN_PAGE_LABEL: &str = "N/A";

/// Labels each result with its 1-based rank and page, in input order.
pub fn assemble(results: &[RetrievedResult]) -> AssembledContext {
    let blocks = results
        .iter()
        .enumerate()
        .map(|(position, result)| {
            format!(
                "Context {} (Page {}):\n{}",
                position + 1,
                page_label(result.chunk.source_page),
                result.chunk.text.trim()
            )
        })
        .collect::<Vec<_>>();

    AssembledContext::new(blocks.join("\n\n"))
}

fn page_label(page: Option<u32>) -> String {
    page.map(|page| page.to_string())
        .unwrap_or_else(|| UNKNOWN_PAGE_LABEL.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Chunk;

    fn result(text: &str, page: Option<u32>, score: f32) -> RetrievedResult {
        RetrievedResult {
            chunk: Chunk {
                text: text.to_string(),
                source_page: page,
            },
            score,
        }
    }

    #[test]
    fn blocks_are_numbered_and_joined() {
        let context = assemble(&[result("foo", Some(2), 0.1), result("bar", Some(5), 0.3)]);

        assert_eq!(
            context.as_str(),
            "Context 1 (Page 2):\nfoo\n\nContext 2 (Page 5):\nbar"
        );
    }

    #[test]
    fn input_order_wins_over_score() {
        let context = assemble(&[result("worse", Some(0), 0.2), result("better", Some(1), 0.9)]);

        let worse = context.as_str().find("worse").expect("first block");
        let better = context.as_str().find("better").expect("second block");
        assert!(worse < better);
    }

    #[test]
    fn unknown_page_is_labelled_na() {
        let context = assemble(&[result("  orphan text \n", None, 0.5)]);
        assert_eq!(context.as_str(), "Context 1 (Page N/A):\norphan text");
    }

    #[test]
    fn no_results_give_empty_context() {
        assert!(assemble(&[]).is_empty());
    }
}
