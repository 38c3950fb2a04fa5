// Integration tests for the C interpreter

mod common;

use common::{run_err, run_err_with, run_ok, run_with, runtime_tag, stdout_of};
use krun::{MemoryFs, Phase, RunConfig};

#[test]
fn test_simple_arithmetic() {
    let source = r#"
        int main() {
            int x = 5;
            int y = 10;
            int z = x + y;
            return z;
        }
    "#;
    assert_eq!(run_ok(source).status, 15);
}

#[test]
fn test_function_call() {
    let source = r#"
        int add(int a, int b) {
            return a + b;
        }

        int main() {
            int result = add(3, 4);
            printf("%d\n", result);
            return 0;
        }
    "#;
    assert_eq!(stdout_of(source), "7\n");
}

#[test]
fn test_increment_and_decrement() {
    let source = r#"
        int main() {
            int n = 5;
            int x = n++;
            printf("%d %d\n", x, n);
            n = 5;
            x = ++n;
            printf("%d %d\n", x, n);
            x = n--;
            printf("%d %d %d\n", x, n, --n);
            return 0;
        }
    "#;
    assert_eq!(stdout_of(source), "5 6\n6 6\n6 5 4\n");
}

#[test]
fn test_ternary_skips_untaken_branch() {
    let source = r#"
        int count = 0;

        int bump(void) {
            count++;
            return count;
        }

        int main() {
            int x = 1 ? 10 : bump();
            int y = 0 ? bump() : 20;
            printf("%d %d %d\n", x, y, count);
            printf("%s\n", x > y ? "big" : "small");
            return 0;
        }
    "#;
    assert_eq!(stdout_of(source), "10 20 0\nsmall\n");
}

#[test]
fn test_itoa_and_reverse() {
    let source = r#"
        #include <stdio.h>
        #include <string.h>

        void reverse(char s[])
        {
            int c, i, j;

            for (i = 0, j = strlen(s)-1; i < j; i++, j--) {
                c = s[i];
                s[i] = s[j];
                s[j] = c;
            }
        }

        void itoa(int n, char s[])
        {
            int i, sign;

            if ((sign = n) < 0)
                n = -n;
            i = 0;
            do {
                s[i++] = n % 10 + '0';
            } while ((n /= 10) > 0);
            if (sign < 0)
                s[i++] = '-';
            s[i] = '\0';
            reverse(s);
        }

        int main()
        {
            char buf[20];
            itoa(123, buf);
            printf("%s\n", buf);
            itoa(-45, buf);
            printf("%s\n", buf);
            return 0;
        }
    "#;
    assert_eq!(stdout_of(source), "123\n-45\n");
}

#[test]
fn test_binsearch() {
    let source = r#"
        int binsearch(int x, int v[], int n)
        {
            int low, high, mid;

            low = 0;
            high = n - 1;
            while (low <= high) {
                mid = (low + high) / 2;
                if (x < v[mid])
                    high = mid - 1;
                else if (x > v[mid])
                    low = mid + 1;
                else
                    return mid;
            }
            return -1;
        }

        int main()
        {
            int v[] = {1, 3, 5, 7, 9, 11, 13, 15, 17, 19};
            printf("%d %d\n", binsearch(7, v, 10), binsearch(8, v, 10));
            return 0;
        }
    "#;
    assert_eq!(stdout_of(source), "3 -1\n");
}

#[test]
fn test_swap_through_pointers() {
    let source = r#"
        void swap(int *px, int *py)
        {
            int temp;

            temp = *px;
            *px = *py;
            *py = temp;
        }

        int main()
        {
            int a = 10, b = 20;
            swap(&a, &b);
            printf("%d %d\n", a, b);
            return 0;
        }
    "#;
    assert_eq!(stdout_of(source), "20 10\n");
}

#[test]
fn test_struct_member_access_forms_agree() {
    let source = r#"
        struct point {
            int x;
            int y;
        };

        int main() {
            struct point pt = {1, 2};
            struct point *pp = &pt;

            pt.x = 5;
            printf("%d %d %d\n", pt.x, (*pp).x, pp->x);
            pp->y = 9;
            (*pp).x = 7;
            printf("%d %d\n", pt.x, pt.y);
            return 0;
        }
    "#;
    assert_eq!(stdout_of(source), "5 5 5\n7 9\n");
}

#[test]
fn test_struct_values_are_copied() {
    let source = r#"
        struct point { int x; int y; };

        struct point makepoint(int x, int y) {
            struct point t;
            t.x = x;
            t.y = y;
            return t;
        }

        int main() {
            struct point a = makepoint(3, 4);
            struct point b;
            b = a;
            b.x = 10;
            printf("%d %d %d\n", a.x, b.x, makepoint(1, 2).y);
            return 0;
        }
    "#;
    assert_eq!(stdout_of(source), "3 10 2\n");
}

#[test]
fn test_heap_struct_allocation() {
    let source = r#"
        struct node {
            int value;
            struct node *next;
        };

        int main() {
            struct node *head = 0;
            struct node *n;
            int i, sum = 0;

            for (i = 1; i <= 3; i++) {
                n = malloc(sizeof(struct node));
                n->value = i * 10;
                n->next = head;
                head = n;
            }
            for (n = head; n != NULL; n = n->next)
                sum += n->value;
            while (head) {
                n = head->next;
                free(head);
                head = n;
            }
            printf("%d\n", sum);
            return 0;
        }
    "#;
    assert_eq!(stdout_of(source), "60\n");
}

#[test]
fn test_heap_strings() {
    let source = r#"
        int main() {
            char *p = malloc(6);
            char *q;
            strcpy(p, "hello");
            p[0] = 'j';
            q = strdup(p);
            printf("%s %d %d\n", q, (int) strlen(q), strcmp(p, q));
            free(p);
            free(q);
            return 0;
        }
    "#;
    assert_eq!(stdout_of(source), "jello 5 0\n");
}

#[test]
fn test_switch_fallthrough() {
    let source = r#"
        int main() {
            int i;
            for (i = 0; i < 4; i++) {
                switch (i) {
                case 0:
                    printf("zero ");
                case 1:
                    printf("one ");
                    break;
                case 2:
                    printf("two ");
                    break;
                default:
                    printf("other ");
                }
            }
            printf("\n");
            return 0;
        }
    "#;
    assert_eq!(stdout_of(source), "zero one one two other \n");
}

#[test]
fn test_break_continue() {
    let source = r#"
        int main() {
            int i, sum = 0;
            for (i = 0; i < 10; i++) {
                if (i == 7)
                    break;
                if (i % 2)
                    continue;
                sum += i;
            }
            i = 0;
            do {
                i++;
                if (i < 5)
                    continue;
            } while (i < 8);
            printf("%d %d\n", sum, i);
            return 0;
        }
    "#;
    assert_eq!(stdout_of(source), "12 8\n");
}

#[test]
fn test_static_local_keeps_value() {
    let source = r#"
        int counter(void) {
            static int n = 0;
            return ++n;
        }

        int main() {
            counter();
            counter();
            printf("%d\n", counter());
            return 0;
        }
    "#;
    assert_eq!(stdout_of(source), "3\n");
}

#[test]
fn test_recursion() {
    let source = r#"
        long fact(int n) {
            return n <= 1 ? 1 : n * fact(n - 1);
        }

        int main() {
            printf("%ld\n", fact(20));
            return 0;
        }
    "#;
    assert_eq!(stdout_of(source), "2432902008176640000\n");
}

#[test]
fn test_globals_and_arrays() {
    let source = r#"
        #define MAXLINE 5
        int totals[MAXLINE];
        char greeting[] = "hi";

        int main() {
            int i;
            for (i = 0; i < MAXLINE; i++)
                totals[i] += i;
            printf("%d %d %s %d\n", totals[0], totals[4], greeting, (int) sizeof(greeting));
            return 0;
        }
    "#;
    assert_eq!(stdout_of(source), "0 4 hi 3\n");
}

#[test]
fn test_stdin_character_counting() {
    let source = r#"
        #include <stdio.h>

        int main()
        {
            int c, nl = 0, nc = 0;

            while ((c = getchar()) != EOF) {
                ++nc;
                if (c == '\n')
                    ++nl;
                putchar(c);
            }
            printf("%d %d\n", nc, nl);
            return 0;
        }
    "#;
    let run = run_with(source, RunConfig::default().with_stdin("ab\ncd\n"), Box::new(MemoryFs::new()));
    assert_eq!(run.stdout_str(), "ab\ncd\n6 2\n");
}

#[test]
fn test_argv_and_exit_status() {
    let source = r#"
        int main(int argc, char *argv[]) {
            int i;
            for (i = 1; i < argc; i++) {
                printf("%s", argv[i]);
                if (i < argc - 1)
                    printf(" ");
            }
            printf("\n");
            exit(argc);
        }
    "#;
    let run = run_with(
        source,
        RunConfig::default().with_args(["hello", "world"]),
        Box::new(MemoryFs::new()),
    );
    assert_eq!(run.stdout_str(), "hello world\n");
    assert_eq!(run.status, 3);
}

#[test]
fn test_stderr_is_captured_separately() {
    let source = r#"
        int main() {
            fprintf(stderr, "warning: %s\n", "careful");
            fputs("done\n", stdout);
            return 0;
        }
    "#;
    let run = run_ok(source);
    assert_eq!(run.stdout, b"done\n");
    assert_eq!(run.stderr, b"warning: careful\n");
}

#[test]
fn test_division_by_zero_keeps_partial_output() {
    let source = r#"
        int main() {
            int z = 0;
            printf("before\n");
            return 10 / z;
        }
    "#;
    let failure = run_err(source);
    assert_eq!(failure.error.phase(), Phase::Runtime);
    assert_eq!(runtime_tag(&failure), "division");
    assert_eq!(failure.stdout, b"before\n");
}

#[test]
fn test_modulo_by_zero() {
    let failure = run_err("int main() { int a = 5, b = 0; return a % b; }");
    assert_eq!(runtime_tag(&failure), "division");
}

#[test]
fn test_heap_double_free_error() {
    let source = r#"
        int main() {
            int *p = malloc(sizeof(int));
            free(p);
            free(p);
            return 0;
        }
    "#;
    assert_eq!(runtime_tag(&run_err(source)), "free");
}

#[test]
fn test_heap_use_after_free_error() {
    let source = r#"
        int main() {
            int *p = malloc(sizeof(int));
            *p = 1;
            free(p);
            return *p;
        }
    "#;
    assert_eq!(runtime_tag(&run_err(source)), "use-after-release");
}

#[test]
fn test_null_dereference() {
    let source = r#"
        struct point { int x; int y; };
        int main() {
            struct point *p = NULL;
            return p->y;
        }
    "#;
    assert_eq!(runtime_tag(&run_err(source)), "dereference");
}

#[test]
fn test_out_of_bounds_write() {
    let source = r#"
        int main() {
            int a[3];
            int i;
            for (i = 0; i <= 3; i++)
                a[i] = i;
            return 0;
        }
    "#;
    let failure = run_err(source);
    assert_eq!(runtime_tag(&failure), "bounds");
    assert_eq!(failure.error.location().map(|l| l.line), Some(6));
}

#[test]
fn test_uninitialized_read() {
    let source = r#"
        int main() {
            int x;
            printf("%d\n", x);
            return 0;
        }
    "#;
    assert_eq!(runtime_tag(&run_err(source)), "uninitialized");

    let run = run_with(
        "int main() { int x[2]; x[0] = 1; return x[0]; }",
        RunConfig::default(),
        Box::new(MemoryFs::new()),
    );
    assert_eq!(run.status, 1);
}

#[test]
fn test_string_literal_is_read_only() {
    let source = r#"
        int main() {
            char *s = "abc";
            s[0] = 'x';
            return 0;
        }
    "#;
    assert_eq!(runtime_tag(&run_err(source)), "write");
}

#[test]
fn test_call_depth_limit() {
    let source = r#"
        int down(int n) { return down(n + 1); }
        int main() { return down(0); }
    "#;
    let failure = run_err_with(source, RunConfig::default().with_max_call_depth(100));
    assert_eq!(runtime_tag(&failure), "stack");
}

#[test]
fn test_heap_limit_makes_malloc_fail() {
    let source = r#"
        int main() {
            char *big = malloc(4096);
            printf("%d\n", big == NULL);
            return 0;
        }
    "#;
    let run = run_with(source, RunConfig::default().with_heap_limit(1024), Box::new(MemoryFs::new()));
    assert_eq!(run.stdout_str(), "1\n");
}

#[test]
fn test_huge_local_array_is_an_allocation_error() {
    let source = r#"
        int main() {
            printf("start\n");
            char big[100000000000L];
            big[0] = 1;
            return 0;
        }
    "#;
    let failure = run_err(source);
    assert_eq!(runtime_tag(&failure), "allocation");
    assert_eq!(failure.stdout, b"start\n");
}

#[test]
fn test_huge_global_array_is_an_allocation_error() {
    let source = r#"
        long table[100000000000L];
        int main() {
            printf("unreachable\n");
            return 0;
        }
    "#;
    let failure = run_err(source);
    assert_eq!(runtime_tag(&failure), "allocation");
    assert!(failure.stdout.is_empty());
}

#[test]
fn test_stack_limit_counts_live_frames() {
    let source = r#"
        int depth(int n) {
            char frame[1000];
            frame[0] = n;
            if (n == 0)
                return 0;
            return depth(n - 1) + 1;
        }
        int main() {
            printf("%d\n", depth(10));
            printf("%d\n", depth(100));
            return 0;
        }
    "#;
    let failure = run_err_with(source, RunConfig::default().with_stack_limit(50_000));
    assert_eq!(runtime_tag(&failure), "allocation");
    assert_eq!(failure.stdout, b"10\n");
}

#[test]
fn test_compile_errors_report_their_phase() {
    let failure = run_err("int main() { return \"unterminated; }");
    assert_eq!(failure.error.phase(), Phase::Lex);

    let failure = run_err("int main() { return 1 }");
    assert_eq!(failure.error.phase(), Phase::Parse);

    let failure = run_err("int main() { return missing; }");
    assert_eq!(failure.error.phase(), Phase::Resolve);
    assert!(failure.stdout.is_empty());
}
