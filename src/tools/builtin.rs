//! Built-in business tools offered to the agent.
//!
//! `searchSupportTickets` searches the support ticket corpus and
//! `getSalesData` reads regional sales figures. Both are constructed with
//! [`AgentTool::new`] and returned as `Arc<dyn Tool>`.

use std::sync::Arc;

use super::registry::ToolRegistry;
use super::tool::{AgentTool, Tool};
use super::types::ToolParameters;
use crate::dataset::{DatasetRetriever, Retriever, SalesLedger};

pub const SEARCH_SUPPORT_TICKETS: &str = "searchSupportTickets";
pub const GET_SALES_DATA: &str = "getSalesData";

/// Create the `searchSupportTickets` tool over any retriever.
pub fn search_support_tickets_tool(retriever: Arc<dyn Retriever>) -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        SEARCH_SUPPORT_TICKETS,
        "Searches the knowledge base of customer support tickets for relevant issues and solutions.",
        ToolParameters::object()
            .string(
                "query",
                "The user's issue or question to search for, e.g., \"login issue\" or \"billing discrepancy\".",
                true,
            )
            .build(),
        move |args| {
            let retriever = Arc::clone(&retriever);
            async move {
                let query = args.get_str("query")?;
                let hits = retriever.search(query).await?;
                Ok(serde_json::to_value(hits)?)
            }
        },
    ))
}

/// Create the `getSalesData` tool. A missing or blank region returns every region.
pub fn sales_data_tool(ledger: Arc<SalesLedger>) -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        GET_SALES_DATA,
        "Retrieves sales data for a specific region. Use this to find financial figures and performance metrics.",
        ToolParameters::object()
            .string(
                "region",
                "The geographical region to get sales data for. e.g., \"NA\", \"EMEA\", \"APAC\". If not specified, returns all regions.",
                false,
            )
            .build(),
        move |args| {
            let ledger = Arc::clone(&ledger);
            async move {
                let records = ledger.lookup(args.get_str_opt("region"));
                Ok(serde_json::to_value(records)?)
            }
        },
    ))
}

/// Registry holding both built-in tools over the built-in datasets.
pub fn default_registry() -> ToolRegistry {
    ToolRegistry::new()
        .with_tool(search_support_tickets_tool(Arc::new(
            DatasetRetriever::support_tickets(),
        )))
        .with_tool(sales_data_tool(Arc::new(SalesLedger::default())))
}
