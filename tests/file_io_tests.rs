// Stream, descriptor and directory calls against both filesystems

mod common;

use common::{run_err, run_with, runtime_tag, stdout_of};
use krun::{HostFs, MemoryFs, RunConfig};
use std::fs;

#[test]
fn test_stream_write_then_read_back() {
    let source = r#"
        #include <stdio.h>

        int main() {
            FILE *fp = fopen("notes.txt", "w");
            char line[100];

            fprintf(fp, "line %d\n", 1);
            fputs("line 2\n", fp);
            fclose(fp);

            fp = fopen("notes.txt", "r");
            while (fgets(line, sizeof(line), fp) != NULL)
                printf("> %s", line);
            printf("eof=%d\n", feof(fp));
            fclose(fp);
            return 0;
        }
    "#;
    assert_eq!(stdout_of(source), "> line 1\n> line 2\neof=1\n");
}

#[test]
fn test_fopen_failure_sets_errno() {
    let source = r#"
        int main() {
            FILE *fp = fopen("missing.txt", "r");
            if (fp == NULL) {
                perror("missing.txt");
                return 2;
            }
            return 0;
        }
    "#;
    let run = run_with(source, RunConfig::default(), Box::new(MemoryFs::new()));
    assert_eq!(run.status, 2);
    assert_eq!(run.stderr, b"missing.txt: No such file or directory\n");
}

#[test]
fn test_posix_descriptor_calls() {
    let source = r#"
        int main() {
            char buf[8];
            int fd = open("data.bin", O_RDONLY);
            int n;

            lseek(fd, 4, SEEK_SET);
            n = read(fd, buf, 3);
            buf[n] = '\0';
            printf("%d %s\n", fd, buf);
            close(fd);

            fd = creat("out.txt", 0644);
            printf("%d\n", fd);
            printf("%d\n", (int) write(fd, "x", 1));
            close(fd);
            unlink("out.txt");
            printf("%d\n", open("out.txt", O_RDONLY));
            return 0;
        }
    "#;
    let fs = MemoryFs::new().with_file("data.bin", "0123456789");
    let run = run_with(source, RunConfig::default(), Box::new(fs));
    assert_eq!(run.stdout_str(), "3 456\n3\n1\n-1\n");
}

#[test]
fn test_read_count_larger_than_buffer() {
    let source = r#"
        int main() {
            char b[64];
            int fd = open("small.txt", O_RDONLY);
            long n = read(fd, b, 100000000000L);
            b[n] = '\0';
            printf("%ld %s\n", n, b);
            return 0;
        }
    "#;
    let fs = MemoryFs::new().with_file("small.txt", "hi");
    let run = run_with(source, RunConfig::default(), Box::new(fs));
    assert_eq!(run.stdout_str(), "2 hi\n");
}

#[test]
fn test_read_past_buffer_is_a_bounds_error() {
    let source = r#"
        int main() {
            char b[2];
            int fd = creat("ten.txt", 0644);
            write(fd, "0123456789", 10);
            close(fd);
            fd = open("ten.txt", O_RDONLY);
            printf("reading\n");
            read(fd, b, 100);
            return 0;
        }
    "#;
    let failure = run_err(source);
    assert_eq!(runtime_tag(&failure), "bounds");
    assert_eq!(failure.stdout, b"reading\n");
}

#[test]
fn test_write_at_huge_offset_fails_with_efbig() {
    let source = r#"
        int main() {
            int fd = creat("sparse.bin", 0644);
            long pos = lseek(fd, 0x7ffffffffffffff0L, SEEK_SET);
            long n = write(fd, "abc", 3);
            printf("%d %ld\n", pos > 0, n);
            if (n < 0)
                perror("write");
            return 0;
        }
    "#;
    let run = run_with(source, RunConfig::default(), Box::new(MemoryFs::new()));
    assert_eq!(run.stdout_str(), "1 -1\n");
    assert_eq!(run.stderr, b"write: File too large\n");
}

#[test]
fn test_console_descriptors() {
    let source = r#"
        int main() {
            char buf[16];
            long n = read(0, buf, sizeof(buf));
            write(1, buf, n);
            write(2, "err\n", 4);
            if (lseek(1, 0, SEEK_SET) < 0)
                perror("lseek");
            return 0;
        }
    "#;
    let run = run_with(source, RunConfig::default().with_stdin("input\n"), Box::new(MemoryFs::new()));
    assert_eq!(run.stdout_str(), "input\n");
    assert_eq!(run.stderr, b"err\nlseek: Illegal seek\n");
}

#[test]
fn test_fgets_from_stdin() {
    let source = r#"
        int main() {
            char line[4];
            int count = 0;
            while (fgets(line, sizeof(line), stdin) != NULL)
                count++;
            printf("%d\n", count);
            return 0;
        }
    "#;
    let run = run_with(source, RunConfig::default().with_stdin("abcdef\nxy\n"), Box::new(MemoryFs::new()));
    // "abc" "def" "\n" "xy\n"
    assert_eq!(run.stdout_str(), "4\n");
}

const LIST_DIRECTORY: &str = r#"
    #include <stdio.h>
    #include <dirent.h>

    int main() {
        DIR *dir = opendir(".");
        struct dirent *entry;

        if (dir == NULL) {
            perror("opendir");
            return 1;
        }
        while ((entry = readdir(dir)) != NULL) {
            if (entry->d_name[0] == '.')
                continue;
            if (entry->d_type == DT_DIR)
                printf("%s dir\n", entry->d_name);
            else
                printf("%s file\n", entry->d_name);
        }
        closedir(dir);
        return 0;
    }
"#;

#[test]
fn test_directory_listing_on_host() {
    let root = tempfile::tempdir().unwrap();
    fs::write(root.path().join("a.c"), "int main() { return 0; }\n").unwrap();
    fs::write(root.path().join("b.txt"), "text\n").unwrap();
    fs::write(root.path().join(".hidden"), "").unwrap();
    fs::create_dir(root.path().join("sub")).unwrap();

    let run = run_with(LIST_DIRECTORY, RunConfig::default(), Box::new(HostFs::new(root.path())));
    assert_eq!(run.stdout_str(), "a.c file\nb.txt file\nsub dir\n");
}

#[test]
fn test_directory_listing_in_memory() {
    let fs = MemoryFs::new().with_file("z.c", "").with_dir("lib");
    let run = run_with(LIST_DIRECTORY, RunConfig::default(), Box::new(fs));
    assert_eq!(run.stdout_str(), "lib dir\nz.c file\n");
}

#[test]
fn test_host_writes_land_under_root() {
    let root = tempfile::tempdir().unwrap();
    fs::create_dir(root.path().join("out")).unwrap();
    let source = r#"
        int main() {
            FILE *fp = fopen("out/report.txt", "w");
            int i;
            for (i = 1; i <= 3; i++)
                fprintf(fp, "%d squared is %d\n", i, i * i);
            return fclose(fp);
        }
    "#;
    let run = run_with(source, RunConfig::default(), Box::new(HostFs::new(root.path())));
    assert_eq!(run.status, 0);
    let written = fs::read_to_string(root.path().join("out/report.txt")).unwrap();
    assert_eq!(written, "1 squared is 1\n2 squared is 4\n3 squared is 9\n");
}

#[test]
fn test_host_paths_cannot_escape_root() {
    let root = tempfile::tempdir().unwrap();
    let source = r#"
        int main() {
            FILE *fp = fopen("../secret.txt", "r");
            if (fp == NULL)
                perror("../secret.txt");
            return fp == NULL;
        }
    "#;
    let run = run_with(source, RunConfig::default(), Box::new(HostFs::new(root.path())));
    assert_eq!(run.status, 1);
    assert_eq!(run.stderr, b"../secret.txt: Permission denied\n");
}

/// Directory helpers from the K&R chapter 7 directory walk-through
const DIRECTORY_OPERATIONS: &str = r#"
#include <stdio.h>
#include <stdlib.h>
#include <string.h>
#include <dirent.h>
#include <sys/stat.h>
#include <sys/types.h>

void list_directory(const char *path) {
    DIR *dir = opendir(path);
    if (dir == NULL) {
        perror("opendir");
        return;
    }

    printf("Contents of directory: %s\n", path);

    struct dirent *entry;
    int count = 0;

    while ((entry = readdir(dir)) != NULL) {
        count++;
        printf("  [%d] %s", count, entry->d_name);

        if (entry->d_type == DT_DIR)
            printf(" (directory)");
        else if (entry->d_type == DT_REG)
            printf(" (file)");
        else if (entry->d_type == DT_LNK)
            printf(" (symlink)");

        printf("\n");
    }

    printf("Total entries: %d\n", count);
    closedir(dir);
}

void count_entries(const char *path) {
    DIR *dir = opendir(path);
    if (dir == NULL) {
        perror("opendir");
        return;
    }

    int files = 0, dirs = 0, links = 0, other = 0;
    struct dirent *entry;

    while ((entry = readdir(dir)) != NULL) {
        if (strcmp(entry->d_name, ".") == 0 || strcmp(entry->d_name, "..") == 0)
            continue;

        if (entry->d_type == DT_DIR)
            dirs++;
        else if (entry->d_type == DT_REG)
            files++;
        else if (entry->d_type == DT_LNK)
            links++;
        else
            other++;
    }

    printf("Directory statistics for: %s\n", path);
    printf("  Files:       %d\n", files);
    printf("  Directories: %d\n", dirs);
    printf("  Symlinks:    %d\n", links);
    printf("  Other:       %d\n", other);
    printf("  Total:       %d\n", files + dirs + links + other);

    closedir(dir);
}

void list_files_by_extension(const char *path, const char *ext) {
    DIR *dir = opendir(path);
    if (dir == NULL) {
        perror("opendir");
        return;
    }

    printf("Files with extension '.%s' in %s:\n", ext, path);

    struct dirent *entry;
    int count = 0;

    while ((entry = readdir(dir)) != NULL) {
        if (entry->d_type != DT_REG && entry->d_type != DT_UNKNOWN)
            continue;

        const char *dot = strrchr(entry->d_name, '.');
        if (dot && strcmp(dot + 1, ext) == 0) {
            count++;
            printf("  [%d] %s\n", count, entry->d_name);
        }
    }

    printf("Found %d files\n", count);
    closedir(dir);
}

long get_directory_size(const char *path) {
    DIR *dir = opendir(path);
    if (dir == NULL) {
        return 0;
    }

    long total_size = 0;
    struct dirent *entry;
    char full_path[1024];

    while ((entry = readdir(dir)) != NULL) {
        if (strcmp(entry->d_name, ".") == 0 || strcmp(entry->d_name, "..") == 0)
            continue;

        snprintf(full_path, sizeof(full_path), "%s/%s", path, entry->d_name);

        struct stat st;
        if (stat(full_path, &st) == 0) {
            if (S_ISREG(st.st_mode)) {
                total_size += st.st_size;
            } else if (S_ISDIR(st.st_mode)) {
                total_size += get_directory_size(full_path);
            }
        }
    }

    closedir(dir);
    return total_size;
}

void find_files(const char *path, const char *pattern) {
    DIR *dir = opendir(path);
    if (dir == NULL) {
        perror("opendir");
        return;
    }

    printf("Files matching '%s' in %s:\n", pattern, path);

    struct dirent *entry;
    int count = 0;

    while ((entry = readdir(dir)) != NULL) {
        if (strstr(entry->d_name, pattern) != NULL) {
            count++;
            printf("  [%d] %s\n", count, entry->d_name);
        }
    }

    printf("Found %d matches\n", count);
    closedir(dir);
}

void list_directory_sorted(const char *path) {
    DIR *dir = opendir(path);
    if (dir == NULL) {
        perror("opendir");
        return;
    }

    int count = 0;
    struct dirent *entry;
    while ((entry = readdir(dir)) != NULL) {
        count++;
    }

    char **names = malloc(count * sizeof(char *));
    if (names == NULL) {
        closedir(dir);
        return;
    }

    rewinddir(dir);
    int i = 0;
    while ((entry = readdir(dir)) != NULL) {
        names[i] = strdup(entry->d_name);
        i++;
    }

    for (int j = 0; j < count - 1; j++) {
        for (int k = 0; k < count - j - 1; k++) {
            if (strcmp(names[k], names[k + 1]) > 0) {
                char *temp = names[k];
                names[k] = names[k + 1];
                names[k + 1] = temp;
            }
        }
    }

    printf("Directory %s (sorted):\n", path);
    for (int j = 0; j < count; j++) {
        printf("  [%d] %s\n", j + 1, names[j]);
        free(names[j]);
    }

    free(names);
    closedir(dir);
}

int is_directory_empty(const char *path) {
    DIR *dir = opendir(path);
    if (dir == NULL) {
        return -1;
    }

    struct dirent *entry;
    int count = 0;

    while ((entry = readdir(dir)) != NULL) {
        if (strcmp(entry->d_name, ".") != 0 && strcmp(entry->d_name, "..") != 0) {
            count++;
            break;
        }
    }

    closedir(dir);
    return count == 0;
}

void list_directory_recursive(const char *path, int depth) {
    DIR *dir = opendir(path);
    if (dir == NULL) {
        return;
    }

    struct dirent *entry;
    char full_path[1024];

    while ((entry = readdir(dir)) != NULL) {
        if (strcmp(entry->d_name, ".") == 0 || strcmp(entry->d_name, "..") == 0)
            continue;

        for (int i = 0; i < depth; i++)
            printf("  ");
        printf("%s", entry->d_name);

        if (entry->d_type == DT_DIR) {
            printf("/\n");
            snprintf(full_path, sizeof(full_path), "%s/%s", path, entry->d_name);
            list_directory_recursive(full_path, depth + 1);
        } else {
            printf("\n");
        }
    }

    closedir(dir);
}
"#;

fn directory_tree() -> MemoryFs {
    MemoryFs::new()
        .with_file("test_dir/file1.txt", "hello\n")
        .with_file("test_dir/file2.c", "int x;\n")
        .with_file("test_dir/file3.txt", "abc")
        .with_file("test_dir/subdir1/nested.txt", "nested\n")
        .with_dir("test_dir/subdir2")
        .with_dir("test_dir/empty_dir")
}

fn run_directory_operations(main: &str) -> String {
    let source = format!("{}\n{}", DIRECTORY_OPERATIONS, main);
    let run = run_with(&source, RunConfig::default(), Box::new(directory_tree()));
    assert_eq!(run.status, 0);
    run.stdout_str()
}

#[test]
fn test_directory_listing_and_statistics() {
    let output = run_directory_operations(
        r#"int main() {
            list_directory("test_dir");
            count_entries("test_dir");
            return 0;
        }"#,
    );
    assert_eq!(
        output,
        "Contents of directory: test_dir\n\
         \x20 [1] . (directory)\n\
         \x20 [2] .. (directory)\n\
         \x20 [3] empty_dir (directory)\n\
         \x20 [4] file1.txt (file)\n\
         \x20 [5] file2.c (file)\n\
         \x20 [6] file3.txt (file)\n\
         \x20 [7] subdir1 (directory)\n\
         \x20 [8] subdir2 (directory)\n\
         Total entries: 8\n\
         Directory statistics for: test_dir\n\
         \x20 Files:       3\n\
         \x20 Directories: 3\n\
         \x20 Symlinks:    0\n\
         \x20 Other:       0\n\
         \x20 Total:       6\n"
    );
}

#[test]
fn test_directory_filters_and_sorting() {
    let output = run_directory_operations(
        r#"int main() {
            list_files_by_extension("test_dir", "txt");
            find_files("test_dir", "file");
            list_directory_sorted("test_dir/subdir1");
            return 0;
        }"#,
    );
    assert_eq!(
        output,
        "Files with extension '.txt' in test_dir:\n\
         \x20 [1] file1.txt\n\
         \x20 [2] file3.txt\n\
         Found 2 files\n\
         Files matching 'file' in test_dir:\n\
         \x20 [1] file1.txt\n\
         \x20 [2] file2.c\n\
         \x20 [3] file3.txt\n\
         Found 3 matches\n\
         Directory test_dir/subdir1 (sorted):\n\
         \x20 [1] .\n\
         \x20 [2] ..\n\
         \x20 [3] nested.txt\n"
    );
}

#[test]
fn test_directory_walks_with_stat() {
    let output = run_directory_operations(
        r#"int main() {
            printf("%d %d %d\n", is_directory_empty("test_dir"),
                   is_directory_empty("test_dir/empty_dir"), is_directory_empty("missing"));
            list_directory_recursive("test_dir", 0);
            printf("Total size: %ld bytes\n", get_directory_size("test_dir"));
            return 0;
        }"#,
    );
    assert_eq!(
        output,
        "0 1 -1\n\
         empty_dir/\n\
         file1.txt\n\
         file2.c\n\
         file3.txt\n\
         subdir1/\n\
         \x20 nested.txt\n\
         subdir2/\n\
         Total size: 23 bytes\n"
    );
}

#[test]
fn test_stat_on_host() {
    let root = tempfile::tempdir().unwrap();
    fs::create_dir(root.path().join("logs")).unwrap();
    fs::write(root.path().join("logs/today.log"), "0123456789").unwrap();
    let source = r#"
        int main() {
            struct stat st;
            if (stat("logs/today.log", &st) == 0)
                printf("%d %d %ld\n", S_ISREG(st.st_mode), S_ISDIR(st.st_mode), st.st_size);
            if (stat("logs", &st) == 0)
                printf("%d %d\n", S_ISREG(st.st_mode), S_ISDIR(st.st_mode));
            if (stat("logs/missing.log", &st) < 0)
                perror("stat");
            return 0;
        }
    "#;
    let run = run_with(source, RunConfig::default(), Box::new(HostFs::new(root.path())));
    assert_eq!(run.stdout_str(), "1 0 10\n0 1\n");
    assert_eq!(run.stderr, b"stat: No such file or directory\n");
}
