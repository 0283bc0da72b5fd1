/// Starter code shown when a participant switches the editor language.
pub fn starter_template(language: &str) -> String {
    match language {
        "javascript" => "// JavaScript\nfunction solve() {\n  \n}\n\nsolve();\n",
        "typescript" => "// TypeScript\nfunction solve(): void {\n  \n}\n\nsolve();\n",
        "python" => "# Python\ndef solve():\n    pass\n\n\nif __name__ == \"__main__\":\n    solve()\n",
        "rust" => "// Rust\nfn main() {\n    \n}\n",
        "go" => "// Go\npackage main\n\nimport \"fmt\"\n\nfunc main() {\n\tfmt.Println()\n}\n",
        "java" => "// Java\npublic class Main {\n    public static void main(String[] args) {\n        \n    }\n}\n",
        "cpp" => "// C++\n#include <iostream>\n\nint main() {\n    return 0;\n}\n",
        _ => "// Start coding\n",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_language_has_specific_template() {
        assert!(starter_template("python").starts_with("# Python"));
        assert!(starter_template("rust").contains("fn main()"));
    }

    #[test]
    fn unknown_language_falls_back() {
        assert_eq!(starter_template("cobol"), "// Start coding\n");
    }
}
