//! Built-in prompt definitions, one per pipeline stage.
//!
//! Each entry is a complete YAML definition so that a workspace override is
//! written in exactly the same shape.

pub const ROUTER_CLASSIFY: &str = "router.classify";
pub const QUERY_SELECT: &str = "query.select";
pub const QUERY_JOIN_PLAN: &str = "query.join_plan";
pub const ANSWER_COMPOSE: &str = "answer.compose";
pub const ANSWER_EVALUATE: &str = "answer.evaluate";
pub const ANSWER_FALLBACK: &str = "answer.fallback";

/// All built-in prompt sources, keyed by id.
pub const BUILTIN_PROMPTS: &[(&str, &str)] = &[
    (ROUTER_CLASSIFY, ROUTER_CLASSIFY_YAML),
    (QUERY_SELECT, QUERY_SELECT_YAML),
    (QUERY_JOIN_PLAN, QUERY_JOIN_PLAN_YAML),
    (ANSWER_COMPOSE, ANSWER_COMPOSE_YAML),
    (ANSWER_EVALUATE, ANSWER_EVALUATE_YAML),
    (ANSWER_FALLBACK, ANSWER_FALLBACK_YAML),
];

const ROUTER_CLASSIFY_YAML: &str = r#"
id: router.classify
title: Route Classification
apiVersion: "1.0"
createdBy: concierge
behavior:
  tone: neutral
  style: strict
temperature: 0.1
maxTokens: 8
template: |
  Determine which type of information is needed to answer the customer's message.

  Conversation so far:
  {{#if context}}{{context}}{{else}}(none){{/if}}

  Message: "{{question}}"

  Reply with exactly one of these labels and nothing else:
  - document (company policies: returns, refunds, shipping, warranty, payments, privacy)
  - tabular (catalogue and account data: products, prices, stock, users, orders)
  - both (the answer needs policy text and catalogue or account data)
  - general (greetings, thanks, small talk, or anything needing neither)

  Examples:
  "What is your return policy?" -> document
  "Do you have product 42 in stock?" -> tabular
  "Can I still return the headphones I bought last week?" -> both
  "Hello" -> general
output:
  format: label
"#;

const QUERY_SELECT_YAML: &str = r#"
id: query.select
title: Structured Query Synthesis
apiVersion: "1.0"
createdBy: concierge
behavior:
  tone: neutral
  style: strict
temperature: 0.1
maxTokens: 400
template: |
  Given the following table schema:

  {{schema}}

  Produce query parameters that answer this question: "{{question}}"

  Return a JSON object with these fields:
  - select: comma-separated list of columns to return, or "*" for all
  - filters: array of filter objects, each with:
    - column: the column name
    - operator: one of "eq", "neq", "gt", "lt", "gte", "lte", "like", "ilike", "in"
    - value: the value to compare against (an array for "in")
  - order: optional column to order by
  - order_direction: "asc" or "desc"
  - limit: optional positive number of rows to return

  Only return the JSON without any explanation.
output:
  format: json
"#;

const QUERY_JOIN_PLAN_YAML: &str = r#"
id: query.join_plan
title: Cross-Collection Join Planning
apiVersion: "1.0"
createdBy: concierge
behavior:
  tone: neutral
  style: strict
temperature: 0.1
maxTokens: 300
template: |
  The question below may need data from several tables.

  Available tables:
  {{schemas}}

  Known relationships:
  {{#if relationships}}{{relationships}}{{else}}(none declared){{/if}}

  Question: "{{question}}"

  Choose the primary table to filter first, then the tables to fetch using values
  from the primary rows. Return a JSON object:
  {"primary": "<table>", "joins": [{"collection": "<table>", "local_field": "<column in primary>", "foreign_field": "<column in that table>"}]}

  Use an empty "joins" array if one table is enough. Only return the JSON.
output:
  format: json
"#;

const ANSWER_COMPOSE_YAML: &str = r#"
id: answer.compose
title: Compose Answer
apiVersion: "1.0"
createdBy: concierge
behavior:
  tone: friendly
  style: concise
temperature: 0.3
maxTokens: 300
system: |
  You are a helpful product advisor and policy assistant for an online shop.
  Combine the database and policy information into one natural, customer-friendly reply.

  Guidelines:
  - Be direct and professional. Never say "based on the data", "based on the previous context" or similar.
  - Do not use bullet lists unless the customer asks for a list.
  - Keep answers to at most 3-4 sentences unless the customer explicitly asks for more.
  - Policy questions: explain clearly in 2-3 sentences.
  - Use only the information supplied below; if it does not cover the question, say so briefly.
  - If no policy or database information is available but there is previous conversation, continue naturally.
template: |
  Customer question: {{question}}

  Previous conversation:
  {{#if context}}{{context}}{{else}}(none){{/if}}

  Policy information:
  {{#if documents}}{{documents}}{{else}}None available.{{/if}}

  Database information:
  {{#if tabular}}{{tabular}}{{else}}None available.{{/if}}
  {{#if failures}}

  These sources could not be reached, mention it briefly and answer with what is left:
  {{failures}}
  {{/if}}
  {{#if misses}}

  These lookups ran but found nothing. Say plainly that it was not found, do not invent details:
  {{misses}}
  {{/if}}
  {{#if pitch}}

  The customer wants to be persuaded. Reply with a single persuasive line of under 20 words,
  built only from the database fields above (price, warranty, rating, stock, category).
  {{/if}}
  {{#if previous}}

  An earlier draft did not meet the guidelines:
  {{previous}}
  Write an improved reply.
  {{/if}}
output:
  format: text
"#;

const ANSWER_EVALUATE_YAML: &str = r#"
id: answer.evaluate
title: Evaluate Answer
apiVersion: "1.0"
createdBy: concierge
behavior:
  tone: neutral
  style: strict
temperature: 0.0
maxTokens: 4
template: |
  Customer question: {{question}}

  Does the following response meet the guidelines: concise (at most 4 sentences), relevant
  to the question, persuasive if persuasion was asked for, no extra greetings, no phrases like
  "based on the data", no unrequested bullet lists?
  Answer YES or NO.

  Response:
  {{candidate}}
output:
  format: verdict
"#;

const ANSWER_FALLBACK_YAML: &str = r#"
id: answer.fallback
title: Fallback Answer
apiVersion: "1.0"
createdBy: concierge
behavior:
  tone: friendly
  style: concise
temperature: 0.3
maxTokens: 150
template: |
  The customer said: "{{question}}"

  Answer helpfully in one or two sentences, or explain what you can help with:
  product information (prices, stock, ratings) and company policies (returns, shipping, warranty).
output:
  format: text
"#;
