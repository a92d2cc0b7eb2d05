mod tests_errors;
