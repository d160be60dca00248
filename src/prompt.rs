/// The only table the model is allowed to query.
pub const TABLE_NAME: &str = "STUDENT";

/// Columns of [`TABLE_NAME`], in declaration order.
pub const COLUMNS: [&str; 4] = ["NAME", "CLASS", "SECTION", "MARKS"];

/// Instruction text sent ahead of every question. Passed verbatim to the translator.
pub const STUDENT_PROMPT: &str = r#"
You are an expert in converting English questions to SQL queries!
The SQL database has the name STUDENT and has the following columns: NAME, CLASS, SECTION, and MARKS.
Before generating a query, always verify if the table mentioned in the query exists in the database.
If the table does not exist, return the message:
Error: The table <requested_table_name> does not exist. The available table is STUDENT.
Example 1 - How many entries of records are present?
SQL command: SELECT COUNT(*) FROM STUDENT;

Example 2 - Tell me all the students studying in Data Science class?
SQL command: SELECT * FROM STUDENT WHERE CLASS='Data Science';

Avoid using ``` and the word "sql" in the output.
"#;

/// Code fence the model is told to leave out of its answer.
pub const CODE_FENCE: &str = "```";

/// The sentence the model answers with when a question names a table other than STUDENT.
pub fn unknown_table_message(requested_table: &str) -> String {
    format!(
        "Error: The table {} does not exist. The available table is {}.",
        requested_table, TABLE_NAME
    )
}

/// The table named by a refusal, when `output` is exactly the unknown-table sentence.
pub fn refused_table(output: &str) -> Option<&str> {
    let output = output.trim();
    let table = output
        .strip_prefix("Error: The table ")?
        .split_once(" does not exist.")?
        .0;
    (unknown_table_message(table) == output).then_some(table)
}

/// True when `output` has no code fence and does not open with a bare `sql` tag line.
pub fn is_bare_output(output: &str) -> bool {
    let tagged = output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .is_some_and(|line| line.eq_ignore_ascii_case("sql"));
    !tagged && !output.contains(CODE_FENCE)
}
