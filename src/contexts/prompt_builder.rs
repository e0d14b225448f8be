use crate::data::{ProjectContext, ProjectMode, Requirement};

const ROLE: &str = "You are a professional software development assistant, fluent in many programming languages and frameworks.";

const OUTPUT_FORMAT: &str = "# Output format\n\
For every file, use exactly this format:\n\
```file:<file path>\n\
<file content>\n\
```\n\n\
Between files you may add explanations of your design decisions and your next step plan.\n";

/// Renders the instruction template every stage prompt starts from.
///
/// The two variants differ only in the task, the checklist, and, for an
/// existing project, the list of files already present.
pub fn build_base_prompt(requirement: &Requirement, context: &ProjectContext) -> String {
    match context.mode() {
        ProjectMode::NewProject => new_project_prompt(requirement),
        ProjectMode::ExistingProject => existing_project_prompt(requirement, context),
    }
}

fn new_project_prompt(requirement: &Requirement) -> String {
    format!(
        "{ROLE}\n\n\
         # Task\n\
         Based on the user's requirement, create a complete project including all necessary source files, configuration files and documentation.\n\n\
         # Requirements\n\
         1. Analyze the requirement and choose a suitable project structure and technology stack\n\
         2. Create all necessary files, including source code, configuration and documentation\n\
         3. Make sure the code is of high quality without obvious bugs or errors\n\
         4. Provide clear comments and documentation\n\
         5. Keep the code maintainable and extensible\n\n\
         {OUTPUT_FORMAT}\n\
         # User requirement\n\
         {}\n",
        requirement.as_str()
    )
}

fn existing_project_prompt(requirement: &Requirement, context: &ProjectContext) -> String {
    let mut prompt = format!(
        "{ROLE}\n\n\
         # Task\n\
         Based on the user's requirement, modify the existing project to add features or fix problems.\n\n\
         # Requirements\n\
         1. Analyze the requirement and the existing code\n\
         2. Modify, add or delete the necessary files\n\
         3. Make sure the code is of high quality without obvious bugs or errors\n\
         4. Keep the code style consistent\n\
         5. Keep the code maintainable and extensible\n\n\
         {OUTPUT_FORMAT}\n\
         # User requirement\n\
         {}\n\n\
         # Existing project files\n",
        requirement.as_str()
    );

    for path in context.existing_files() {
        prompt.push_str(&format!("- {}\n", path));
    }

    prompt.push_str("\nIf you need to see the content of more files, say so in your reply.\n");
    prompt
}
